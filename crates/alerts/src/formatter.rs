//! Telegram HTML rendering of rate snapshots.
//!
//! Output is a pure function of the snapshot and comparison. The timestamp
//! shown is the snapshot's own, so rendering the same inputs twice yields
//! identical text.

use chrono_tz::Tz;
use teloxide::utils::html::escape;
use tipocambio_core::{ComparisonResult, RateSnapshot, Source};

/// Default timezone for rendered timestamps.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Guatemala;

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Which message the text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Reply to `/rates`.
    OnDemand,
    /// Morning broadcast to subscribers.
    Daily,
}

impl MessageKind {
    fn heading(self) -> &'static str {
        match self {
            MessageKind::OnDemand => "💱 <b>Tipo de cambio USD → GTQ</b>",
            MessageKind::Daily => "🌅 <b>¡Buenos días! Tipo de cambio de hoy</b>",
        }
    }
}

/// Human-facing name per source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNames {
    pub banguat: String,
    pub banrural: String,
    pub nexa: String,
}

impl Default for DisplayNames {
    fn default() -> Self {
        Self {
            banguat: "🏛️ Banguat (Oficial)".to_string(),
            banrural: "🏦 Banrural (Banca Virtual)".to_string(),
            nexa: "🏪 Nexa Banco (Compra)".to_string(),
        }
    }
}

impl DisplayNames {
    pub fn get(&self, source: Source) -> &str {
        match source {
            Source::Banguat => &self.banguat,
            Source::Banrural => &self.banrural,
            Source::Nexa => &self.nexa,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateFormatter {
    display_names: DisplayNames,
    timezone: Tz,
}

impl Default for RateFormatter {
    fn default() -> Self {
        Self::new(DisplayNames::default(), DEFAULT_TIMEZONE)
    }
}

impl RateFormatter {
    pub fn new(display_names: DisplayNames, timezone: Tz) -> Self {
        Self {
            display_names,
            timezone,
        }
    }

    /// Reply text for `/rates`.
    pub fn format_rates(&self, snapshot: &RateSnapshot, comparison: &ComparisonResult) -> String {
        self.format(MessageKind::OnDemand, snapshot, comparison)
    }

    /// Text for the daily subscriber notification.
    pub fn format_daily(&self, snapshot: &RateSnapshot, comparison: &ComparisonResult) -> String {
        self.format(MessageKind::Daily, snapshot, comparison)
    }

    /// Render a snapshot as Telegram HTML.
    ///
    /// One line per source in snapshot order, then the best rate, the
    /// ranking, and the spread between the highest and lowest rate when at
    /// least two sources reported. A snapshot with no rates renders the
    /// "no data" notice instead of any source lines.
    pub fn format(
        &self,
        kind: MessageKind,
        snapshot: &RateSnapshot,
        comparison: &ComparisonResult,
    ) -> String {
        let mut lines: Vec<String> = vec![kind.heading().to_string(), String::new()];

        if comparison.is_empty() {
            lines.push(
                "❌ No hay tasas de cambio disponibles en este momento. Intenta más tarde."
                    .to_string(),
            );
            lines.push(String::new());
            lines.push(self.footer(snapshot));
            return lines.join("\n");
        }

        for reading in snapshot.iter() {
            let name = self.name(reading.source);
            let line = match reading.value {
                Some(value) if comparison.is_best(reading.source) => {
                    format!("{}: <b>{}</b> ⭐", name, money(value))
                }
                Some(value) => format!("{}: <b>{}</b>", name, money(value)),
                None => format!("{}: <i>No disponible</i>", name),
            };
            lines.push(line);
        }

        if let Some(best) = comparison.best {
            lines.push(String::new());
            lines.push(format!(
                "🏆 <b>Mejor tasa:</b> {} ({})",
                self.name(best.source),
                money(best.value)
            ));
        }

        if comparison.present >= 2 {
            lines.push(String::new());
            lines.push("📊 <b>Ranking:</b>".to_string());
            for (position, ranked) in comparison.ranking.iter().enumerate() {
                lines.push(format!(
                    "{}. {}: {}",
                    position + 1,
                    self.name(ranked.source),
                    money(ranked.value)
                ));
            }
            if let Some(spread) = comparison.spread {
                lines.push(format!("📏 <b>Diferencia:</b> {}", money(spread)));
            }
        }

        lines.push(String::new());
        lines.push(self.footer(snapshot));
        lines.join("\n")
    }

    fn name(&self, source: Source) -> String {
        escape(self.display_names.get(source))
    }

    fn footer(&self, snapshot: &RateSnapshot) -> String {
        let local = snapshot.taken_at().with_timezone(&self.timezone);
        format!("🕐 <i>Actualizado: {}</i>", local.format(TIMESTAMP_FORMAT))
    }
}

fn money(value: f64) -> String {
    format!("Q{:.4}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tipocambio_core::{compare, RateReading};

    fn snapshot(values: [Option<f64>; 3]) -> RateSnapshot {
        // 14:00 UTC is 08:00 in Guatemala (UTC-6, no DST).
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 14, 0, 0).unwrap();
        let readings = Source::ALL.iter().zip(values).map(|(&source, value)| match value {
            Some(v) => RateReading::present(source, v, at),
            None => RateReading::absent(source, at),
        });
        RateSnapshot::from_readings(readings, at).unwrap()
    }

    #[test]
    fn test_format_rates_two_present_one_absent() {
        let snapshot = snapshot([Some(7.85), Some(7.90), None]);
        let comparison = compare(&snapshot);
        let text = RateFormatter::default().format_rates(&snapshot, &comparison);

        let expected = "\
💱 <b>Tipo de cambio USD → GTQ</b>

🏛️ Banguat (Oficial): <b>Q7.8500</b>
🏦 Banrural (Banca Virtual): <b>Q7.9000</b> ⭐
🏪 Nexa Banco (Compra): <i>No disponible</i>

🏆 <b>Mejor tasa:</b> 🏦 Banrural (Banca Virtual) (Q7.9000)

📊 <b>Ranking:</b>
1. 🏦 Banrural (Banca Virtual): Q7.9000
2. 🏛️ Banguat (Oficial): Q7.8500
📏 <b>Diferencia:</b> Q0.0500

🕐 <i>Actualizado: 14/03/2025 08:00</i>";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_format_all_absent_has_no_numeric_lines() {
        let snapshot = snapshot([None, None, None]);
        let comparison = compare(&snapshot);
        let text = RateFormatter::default().format_rates(&snapshot, &comparison);

        assert!(text.contains("No hay tasas de cambio disponibles"));
        for source in Source::ALL {
            assert!(!text.contains(DisplayNames::default().get(source)));
        }
        assert!(!text.contains("<b>Q"));
    }

    #[test]
    fn test_format_single_source_omits_ranking_and_spread() {
        let snapshot = snapshot([Some(7.70), None, None]);
        let comparison = compare(&snapshot);
        let text = RateFormatter::default().format_rates(&snapshot, &comparison);

        assert!(text.contains("Mejor tasa"));
        assert!(!text.contains("Ranking"));
        assert!(!text.contains("Diferencia"));
    }

    #[test]
    fn test_format_is_idempotent() {
        let snapshot = snapshot([Some(7.70), Some(7.72), Some(7.61)]);
        let comparison = compare(&snapshot);
        let formatter = RateFormatter::default();

        assert_eq!(
            formatter.format_daily(&snapshot, &comparison),
            formatter.format_daily(&snapshot, &comparison)
        );
    }

    #[test]
    fn test_daily_heading_differs_from_on_demand() {
        let snapshot = snapshot([Some(7.70), None, None]);
        let comparison = compare(&snapshot);
        let formatter = RateFormatter::default();

        let daily = formatter.format_daily(&snapshot, &comparison);
        let on_demand = formatter.format_rates(&snapshot, &comparison);
        assert!(daily.starts_with("🌅"));
        assert!(on_demand.starts_with("💱"));
    }

    #[test]
    fn test_display_names_are_escaped() {
        let names = DisplayNames {
            banguat: "Banguat <Oficial> & Co".to_string(),
            ..Default::default()
        };
        let formatter = RateFormatter::new(names, chrono_tz::UTC);
        let snapshot = snapshot([Some(7.70), None, None]);
        let text = formatter.format_rates(&snapshot, &compare(&snapshot));

        assert!(text.contains("Banguat &lt;Oficial&gt; &amp; Co"));
        assert!(text.contains("Actualizado: 14/03/2025 14:00"));
    }
}
