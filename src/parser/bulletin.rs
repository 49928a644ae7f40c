//! Hydrological warning bulletins.
//!
//! Bulletins are free text, one warning per file. Fields are located with
//! regular expressions; any field that is not found stays missing.

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use super::encoding::decode;
use crate::error::{ImgwError, Result};
use crate::layout::SourceFormat;
use crate::models::HydroWarning;

const ISSUED: &str =
    r"Data i godzina wydania:\s*(\d{2}\.\d{2}\.\d{4})\s*-\s*godz\.\s*(\d{1,2}:\d{2})";
const OFFICE: &str = r"Nazwa biura prognoz hydrologicznych:\s*(.+?)(?:\n|$)";
const NUMBER: &str = r"INFORMACJA O NIEBEZPIECZNYM ZJAWISKU Nr\s*([^:\n]+)";
const PHENOMENON: &str = r"Zjawisko:\s*(.+?)(?:\n|$)";
const LEVEL: &str = r"Stopień zagrożenia:\s*(\d+)";
const VALIDITY: &str = r"Ważność:\s*od godz\.\s*(\d{1,2}:\d{2})\s*dnia\s*(\d{2}\.\d{2}\.\d{4})\s*do godz\.\s*(\d{1,2}:\d{2})\s*dnia\s*(\d{2}\.\d{2}\.\d{4})";
const AREA: &str = r"(?s)Obszar:\s*(.+?)\s*(?:Przebieg:|\n\s*\n|\z)";
const PROBABILITY: &str = r"Prawdopodobieństwo wystąpienia zjawiska:\s*(\d+)\s*%";
const HYDROLOGIST: &str = r"Dyżurny synoptyk hydrolog:\s*(.+?)(?:\n|$)";

const BULLETIN_DATE_FORMAT: &str = "%d.%m.%Y";

/// Compiled bulletin patterns; build once and share across files.
#[derive(Debug, Clone)]
pub struct BulletinParser {
    issued: Regex,
    office: Regex,
    number: Regex,
    phenomenon: Regex,
    level: Regex,
    validity: Regex,
    area: Regex,
    probability: Regex,
    hydrologist: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ImgwError::Configuration {
        message: format!("invalid bulletin pattern {}: {}", pattern, e),
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, BULLETIN_DATE_FORMAT).ok()
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl BulletinParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            issued: compile(ISSUED)?,
            office: compile(OFFICE)?,
            number: compile(NUMBER)?,
            phenomenon: compile(PHENOMENON)?,
            level: compile(LEVEL)?,
            validity: compile(VALIDITY)?,
            area: compile(AREA)?,
            probability: compile(PROBABILITY)?,
            hydrologist: compile(HYDROLOGIST)?,
        })
    }

    fn first_group(&self, regex: &Regex, text: &str) -> Option<String> {
        regex
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|m| collapse_whitespace(m.as_str()))
            .filter(|value| !value.is_empty())
    }

    /// Extract one warning from raw bulletin bytes.
    pub fn parse(&self, file_name: &str, bytes: &[u8]) -> Result<HydroWarning> {
        let layout = SourceFormat::HydroWarning.layout();
        let text = layout
            .encodings
            .iter()
            .find_map(|&encoding| decode(encoding, bytes))
            .ok_or_else(|| ImgwError::FormatMismatch {
                file: file_name.to_string(),
                tried: layout.format.label().to_string(),
            })?;
        let text = text.replace("\r\n", "\n");

        let mut warning = HydroWarning {
            file_name: file_name.to_string(),
            office: self.first_group(&self.office, &text),
            bulletin_number: self.first_group(&self.number, &text),
            phenomenon: self.first_group(&self.phenomenon, &text),
            area: self.first_group(&self.area, &text),
            hydrologist: self.first_group(&self.hydrologist, &text),
            warning_level: self
                .first_group(&self.level, &text)
                .and_then(|level| level.parse().ok()),
            probability_pct: self
                .first_group(&self.probability, &text)
                .and_then(|pct| pct.parse().ok()),
            ..HydroWarning::default()
        };

        if let Some(captures) = self.issued.captures(&text) {
            warning.issued_on = parse_date(&captures[1]);
            warning.issued_at = Some(captures[2].to_string());
        }

        if let Some(captures) = self.validity.captures(&text) {
            warning.valid_from_time = Some(captures[1].to_string());
            warning.valid_from_date = parse_date(&captures[2]);
            warning.valid_to_time = Some(captures[3].to_string());
            warning.valid_to_date = parse_date(&captures[4]);
        }

        if warning.phenomenon.is_none() && warning.issued_on.is_none() {
            return Err(ImgwError::Parse {
                file: file_name.to_string(),
                reason: "no bulletin fields found".to_string(),
            });
        }

        debug!(
            "{}: bulletin {:?} issued {:?}",
            file_name, warning.bulletin_number, warning.issued_on
        );

        Ok(warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "INSTYTUT METEOROLOGII I GOSPODARKI WODNEJ\r\n\
Nazwa biura prognoz hydrologicznych: BPH w Krakowie\r\n\
INFORMACJA O NIEBEZPIECZNYM ZJAWISKU Nr 12/2021\r\n\
Data i godzina wydania: 03.02.2021 - godz. 14:05\r\n\
Zjawisko: Wezbranie z przekroczeniem stanów ostrzegawczych\r\n\
Stopień zagrożenia: 1\r\n\
Ważność: od godz. 15:00 dnia 03.02.2021 do godz. 12:00 dnia 05.02.2021\r\n\
Obszar: zlewnia Wisły od Sandomierza\r\n\
  do ujścia Sanu\r\n\
Przebieg: wzrost stanów wody\r\n\
Prawdopodobieństwo wystąpienia zjawiska: 80%\r\n\
Dyżurny synoptyk hydrolog: Jan Kowalski\r\n";

    #[test]
    fn test_parse_full_bulletin() {
        let parser = BulletinParser::new().unwrap();
        let warning = parser.parse("OSTRZ_12.TXT", SAMPLE.as_bytes()).unwrap();

        assert_eq!(warning.file_name, "OSTRZ_12.TXT");
        assert_eq!(warning.office.as_deref(), Some("BPH w Krakowie"));
        assert_eq!(warning.bulletin_number.as_deref(), Some("12/2021"));
        assert_eq!(warning.issued_on, NaiveDate::from_ymd_opt(2021, 2, 3));
        assert_eq!(warning.issued_at.as_deref(), Some("14:05"));
        assert_eq!(warning.warning_level, Some(1));
        assert_eq!(warning.valid_from_date, NaiveDate::from_ymd_opt(2021, 2, 3));
        assert_eq!(warning.valid_to_time.as_deref(), Some("12:00"));
        assert_eq!(warning.valid_to_date, NaiveDate::from_ymd_opt(2021, 2, 5));
        assert_eq!(
            warning.area.as_deref(),
            Some("zlewnia Wisły od Sandomierza do ujścia Sanu")
        );
        assert_eq!(warning.probability_pct, Some(80));
        assert_eq!(warning.hydrologist.as_deref(), Some("Jan Kowalski"));
    }

    #[test]
    fn test_partial_bulletin_keeps_missing_fields() {
        let parser = BulletinParser::new().unwrap();
        let warning = parser
            .parse("a.txt", "Zjawisko: Wezbranie\n".as_bytes())
            .unwrap();
        assert_eq!(warning.phenomenon.as_deref(), Some("Wezbranie"));
        assert_eq!(warning.issued_on, None);
        assert_eq!(warning.warning_level, None);
    }

    #[test]
    fn test_unrelated_text_rejected() {
        let parser = BulletinParser::new().unwrap();
        let result = parser.parse("readme.txt", b"nothing to see here");
        assert!(matches!(result, Err(ImgwError::Parse { .. })));
    }
}
