use crate::model::CarrierVariant;

/// Known aliases in compact form (lowercase, alphanumeric only).
///
/// An alias matches when a run of consecutive words in the label
/// concatenates to it, so "Fed Ex", "FEDEX" and "FedEx Ground" all hit
/// `fedex` while "Pickups Ltd" does not hit `ups`. A run may also run
/// past the alias into a service name ("FedExGround", "FEDEX2DAY").
const ALIASES: &[(&str, CarrierVariant)] = &[
    ("fedex", CarrierVariant::FedEx),
    ("federalexpress", CarrierVariant::FedEx),
    ("usps", CarrierVariant::Usps),
    ("uspostal", CarrierVariant::Usps),
    ("usmail", CarrierVariant::Usps),
    ("unitedstatespostal", CarrierVariant::Usps),
    ("ups", CarrierVariant::Ups),
    ("unitedparcel", CarrierVariant::Ups),
    ("dhl", CarrierVariant::Dhl),
];

/// Map a free-text carrier label to a carrier variant. Total: anything not
/// matching a known alias is `Unknown`.
pub fn classify(label: &str) -> CarrierVariant {
    let words = words(label);
    if words.is_empty() {
        return CarrierVariant::Unknown;
    }

    for (alias, variant) in ALIASES {
        if contains_alias(&words, alias) {
            return *variant;
        }
    }

    CarrierVariant::Unknown
}

/// Service names that can follow an alias inside one word.
const SERVICE_SUFFIXES: &[&str] = &[
    "ground", "express", "air", "freight", "home", "priority", "mail", "worldwide", "overnight", "saver",
    "standard", "economy", "international", "smartpost", "firstclass",
];

fn words(label: &str) -> Vec<String> {
    label
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

fn contains_alias(words: &[String], alias: &str) -> bool {
    for start in 0..words.len() {
        let mut joined = String::new();
        for word in &words[start..] {
            joined.push_str(word);
            if joined.len() >= alias.len() {
                break;
            }
        }
        if joined == alias {
            return true;
        }
        if let Some(rest) = joined.strip_prefix(alias) {
            if is_service_suffix(rest) {
                return true;
            }
        }
    }
    false
}

fn is_service_suffix(rest: &str) -> bool {
    rest.starts_with(|c: char| c.is_ascii_digit()) || SERVICE_SUFFIXES.iter().any(|s| rest.starts_with(s))
}
