use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::num::ParseIntError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIntError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

numeric_id!(
    /// Plate ids are small positive integers, persisted as strings ("1").
    PlateId
);
numeric_id!(
    /// Reaction-list ids, same scheme as plates.
    ListId
);

/// Smallest positive integer not in `used`.
pub(crate) fn smallest_unused(used: impl IntoIterator<Item = u32>) -> u32 {
    let used: BTreeSet<u32> = used.into_iter().collect();
    (1..).find(|n| !used.contains(n)).unwrap_or(1)
}

/// `"{prefix} N"` for the smallest N >= 1 not already taken.
pub(crate) fn next_numbered_name<'a>(
    prefix: &str,
    taken: impl IntoIterator<Item = &'a str>,
) -> String {
    let taken: BTreeSet<&str> = taken.into_iter().collect();
    let n = (1u32..)
        .find(|n| !taken.contains(format!("{prefix} {n}").as_str()))
        .unwrap_or(1);
    format!("{prefix} {n}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_the_first_gap() {
        assert_eq!(smallest_unused([]), 1);
        assert_eq!(smallest_unused([1, 2, 3]), 4);
        assert_eq!(smallest_unused([1, 3]), 2);
        assert_eq!(smallest_unused([2, 3]), 1);
    }

    #[test]
    fn numbered_names_fill_gaps() {
        assert_eq!(next_numbered_name("Plate", ["Plate 1", "Plate 3"]), "Plate 2");
        assert_eq!(next_numbered_name("Plate", ["Other"]), "Plate 1");
    }

    #[test]
    fn ids_persist_as_strings() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&PlateId(4))?, "\"4\"");
        let id: ListId = serde_json::from_str("\"12\"")?;
        assert_eq!(id, ListId(12));
        Ok(())
    }
}
