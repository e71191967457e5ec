//! Reference names and targets

pub mod ref_name;
pub mod ref_target;

/// Rejects names git refuses: leading `.` or `/`, `/.`, `..`, `//`, trailing `/`,
/// a `.lock` suffix, `@{`, control characters, space and glob/revision syntax
pub const INVALID_REF_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|\/\/|^\/|\/$|\.lock$|\.$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

/// Shorthands expanded before validation
pub const REF_ALIASES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "@" => "HEAD",
};

/// Prefixes tried, in order, when a name is not found as given
pub const REF_SEARCH_PREFIXES: [&str; 3] = ["refs/", "refs/tags/", "refs/heads/"];
