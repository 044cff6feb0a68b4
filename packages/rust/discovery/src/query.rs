//! Search URL generation from the configured template.

use chrono::{Days, NaiveDate};
use url::Url;
use url::form_urlencoded::byte_serialize;

use lexcrawl_shared::{DocumentType, LexcrawlError, Result};

/// Fill `{date}`, `{type}` and `{page}` in a search URL template.
///
/// The date is written as `YYYY-MM-DD`; the type label is URL-encoded.
/// Pages are numbered from 1.
pub fn render_search_url(
    template: &str,
    date: NaiveDate,
    doc_type: DocumentType,
    page: u32,
) -> Result<Url> {
    let type_param: String = byte_serialize(doc_type.label().as_bytes()).collect();
    let rendered = template
        .replace("{date}", &date.format("%Y-%m-%d").to_string())
        .replace("{type}", &type_param)
        .replace("{page}", &page.to_string());

    Url::parse(&rendered)
        .map_err(|e| LexcrawlError::config(format!("search URL template yields {rendered:?}: {e}")))
}

/// Every day from `start` to `end`, inclusive.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Err(LexcrawlError::validation(format!(
            "start date {start} is after end date {end}"
        )));
    }

    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    Ok(days)
}

/// One search query URL (first page) per day of the range.
pub fn search_urls(
    template: &str,
    start: NaiveDate,
    end: NaiveDate,
    doc_type: DocumentType,
) -> Result<Vec<(NaiveDate, Url)>> {
    days_in_range(start, end)?
        .into_iter()
        .map(|day| Ok((day, render_search_url(template, day, doc_type, 1)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "https://diariodarepublica.pt/dr/pesquisa-avancada?tipo={type}&dataInicio={date}&dataFim={date}&pagina={page}";

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn renders_every_placeholder() {
        let url = render_search_url(TEMPLATE, day(2025, 4, 3), DocumentType::DecretoLei, 2).unwrap();
        assert_eq!(
            url.as_str(),
            "https://diariodarepublica.pt/dr/pesquisa-avancada?tipo=Decreto-Lei&dataInicio=2025-04-03&dataFim=2025-04-03&pagina=2"
        );
    }

    #[test]
    fn type_label_is_encoded() {
        let url = render_search_url(TEMPLATE, day(2025, 4, 3), DocumentType::Resolucao, 1).unwrap();
        assert!(url.as_str().contains("tipo=Resolu%C3%A7%C3%A3o"), "{url}");
    }

    #[test]
    fn one_query_per_day_inclusive() {
        let urls = search_urls(TEMPLATE, day(2025, 2, 27), day(2025, 3, 1), DocumentType::Lei).unwrap();
        let days: Vec<NaiveDate> = urls.iter().map(|(d, _)| *d).collect();
        assert_eq!(days, vec![day(2025, 2, 27), day(2025, 2, 28), day(2025, 3, 1)]);
    }

    #[test]
    fn single_day_range() {
        assert_eq!(days_in_range(day(2025, 1, 1), day(2025, 1, 1)).unwrap().len(), 1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = days_in_range(day(2025, 1, 2), day(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, LexcrawlError::Validation { .. }));
    }
}
