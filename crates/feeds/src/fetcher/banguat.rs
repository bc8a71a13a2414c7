//! Banco de Guatemala SOAP client.

use super::{parse_rate, RateFetcher};
use crate::config::{BanguatConfig, HeaderSettings};
use crate::error::FetchError;
use crate::http::{build_client, send_for_text};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tipocambio_core::Source;
use tracing::debug;

/// SOAP 1.2 request for the daily USD reference rate.
const TIPO_CAMBIO_DIA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap12:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:soap12="http://www.w3.org/2003/05/soap-envelope">
  <soap12:Body>
    <TipoCambioDia xmlns="http://www.banguat.gob.gt/variables/ws/" />
  </soap12:Body>
</soap12:Envelope>"#;

const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// Element holding the official reference rate.
const REFERENCE_ELEMENT: &[u8] = b"referencia";
/// Element holding the sell rate, used when no reference rate is present.
const SELL_ELEMENT: &[u8] = b"venta";

pub struct BanguatClient {
    config: BanguatConfig,
    headers: HeaderSettings,
}

impl BanguatClient {
    pub fn new(config: BanguatConfig, headers: HeaderSettings) -> Self {
        Self { config, headers }
    }
}

#[async_trait]
impl RateFetcher for BanguatClient {
    fn source(&self) -> Source {
        Source::Banguat
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn fetch(&self) -> Result<f64, FetchError> {
        let client = build_client(&self.headers, self.timeout())?;
        let request = client
            .post(&self.config.url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(TIPO_CAMBIO_DIA);

        let xml = send_for_text(request).await?;
        let rate = parse_reference_rate(&xml)?;
        debug!(source = "banguat", rate, "Parsed reference rate");
        Ok(rate)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Reference,
    Sell,
}

/// Extract the USD rate from a `TipoCambioDia` response.
///
/// Takes the first numeric `referencia` element; when there is none, the
/// first numeric `venta` element. Namespace prefixes are ignored.
pub fn parse_reference_rate(xml: &str) -> Result<f64, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<Field> = None;
    let mut sell: Option<f64> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                current = if name.as_ref().eq_ignore_ascii_case(REFERENCE_ELEMENT) {
                    Some(Field::Reference)
                } else if name.as_ref().eq_ignore_ascii_case(SELL_ELEMENT) {
                    Some(Field::Sell)
                } else {
                    None
                };
            }
            Event::Text(t) => {
                let Some(field) = current else {
                    continue;
                };
                let text = t.unescape()?;
                let Ok(value) = parse_rate(&text) else {
                    continue;
                };
                match field {
                    Field::Reference => return Ok(value),
                    Field::Sell => {
                        sell.get_or_insert(value);
                    }
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
    }

    sell.ok_or_else(|| FetchError::NotFound("no referencia or venta element in response".into()))
}
