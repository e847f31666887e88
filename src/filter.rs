use crate::model::ObservedPropertyRef;

/// Comma-separated, case-insensitive substring filter over observed
/// properties. Terms are OR-ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    terms: Vec<String>,
}

impl PropertyFilter {
    /// `None` only for an absent or empty parameter. A blank term such as
    /// the trailing one in `"pm10,"` is kept and matches every item.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw.filter(|raw| !raw.is_empty())?;
        let terms = raw
            .split(',')
            .map(|term| term.trim().to_lowercase())
            .collect();
        Some(Self { terms })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn matches<T: ObservedPropertyRef + ?Sized>(&self, item: &T) -> bool {
        let name = item.observed_property_name().to_lowercase();
        let id = item.observed_property_id().to_lowercase();
        self.terms
            .iter()
            .any(|term| name.contains(term.as_str()) || id.contains(term.as_str()))
    }
}

pub fn apply<T: ObservedPropertyRef>(items: Vec<T>, raw: Option<&str>) -> Vec<T> {
    match PropertyFilter::parse(raw) {
        Some(filter) => items.into_iter().filter(|item| filter.matches(item)).collect(),
        None => items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prop(&'static str, &'static str);

    impl ObservedPropertyRef for Prop {
        fn observed_property_name(&self) -> &str {
            self.0
        }

        fn observed_property_id(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn absent_or_empty_parameter_means_no_filter() {
        assert_eq!(PropertyFilter::parse(None), None);
        assert_eq!(PropertyFilter::parse(Some("")), None);
    }

    #[test]
    fn terms_are_trimmed_and_lowercased() {
        let filter = PropertyFilter::parse(Some(" PM10, no2 ,")).unwrap();
        assert_eq!(filter.terms(), ["pm10", "no2", ""]);
    }

    #[test]
    fn blank_term_matches_everything() {
        let items = vec![Prop("PM10", "PM10"), Prop("NO2", "NO2"), Prop("O3", "O3")];
        assert_eq!(apply(items, Some("pm10,")).len(), 3);

        let items = vec![Prop("PM10", "PM10"), Prop("NO2", "NO2")];
        assert_eq!(apply(items, Some(" , ")).len(), 2);
    }

    #[test]
    fn matches_name_or_id_by_substring() {
        let filter = PropertyFilter::parse(Some("temp")).unwrap();
        assert!(filter.matches(&Prop("Air Temperature", "temperature")));
        assert!(!filter.matches(&Prop("PM10", "PM10")));

        let filter = PropertyFilter::parse(Some("pm")).unwrap();
        let kept = apply(
            vec![Prop("PM10", "PM10"), Prop("PM2.5", "PM2.5"), Prop("NO2", "NO2")],
            Some("pm"),
        );
        assert_eq!(kept.len(), 2);
        assert!(filter.matches(&Prop("x", "pm4")));
    }
}
