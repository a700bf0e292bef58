/// Category used when no rule matches.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Ordered rule table. The first rule with a pattern contained in the
/// lower-cased keyword wins.
const RULES: &[(&[&str], &str)] = &[
    (
        &["bakery", "hotel", "restaurant", "tea shop", "snacks shop"],
        "Food_Businesses",
    ),
    (&["catering", "event management"], "Event_Catering"),
    (&["wholesale", "frozen food"], "Wholesale_Frozen"),
    (&["biryani", "fast food"], "Specialty_Food"),
    (&["canteen", "mess"], "Large_Scale_Buyers"),
];

/// Maps a keyword to its category label. Pure and total.
pub fn categorize(keyword: &str) -> &'static str {
    let keyword = keyword.to_lowercase();
    RULES
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| keyword.contains(p)))
        .map(|(_, category)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}
