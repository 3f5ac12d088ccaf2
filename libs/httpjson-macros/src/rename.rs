/// Field renaming rules accepted by `#[serde(rename_all = "...")]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenameRule {
    LowerCase,
    UpperCase,
    PascalCase,
    CamelCase,
    SnakeCase,
    ScreamingSnakeCase,
    KebabCase,
    ScreamingKebabCase,
}

impl RenameRule {
    pub fn from_name(name: &str) -> Option<Self> {
        let rule = match name {
            "lowercase" => Self::LowerCase,
            "UPPERCASE" => Self::UpperCase,
            "PascalCase" => Self::PascalCase,
            "camelCase" => Self::CamelCase,
            "snake_case" => Self::SnakeCase,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnakeCase,
            "kebab-case" => Self::KebabCase,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebabCase,
            _ => return None,
        };
        Some(rule)
    }

    /// Applies the rule to a field name exactly as serde does.
    ///
    /// Field names are assumed to be `snake_case`: only `_` separates words,
    /// and the rest of the name is kept as written.
    pub fn apply_to_field(self, field: &str) -> String {
        match self {
            Self::LowerCase | Self::SnakeCase => field.to_owned(),
            Self::UpperCase | Self::ScreamingSnakeCase => field.to_ascii_uppercase(),
            Self::PascalCase => {
                let mut pascal = String::with_capacity(field.len());
                let mut capitalize = true;
                for ch in field.chars() {
                    if ch == '_' {
                        capitalize = true;
                    } else if capitalize {
                        pascal.push(ch.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        pascal.push(ch);
                    }
                }
                pascal
            }
            Self::CamelCase => {
                let pascal = Self::PascalCase.apply_to_field(field);
                let mut chars = pascal.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_ascii_lowercase().to_string() + chars.as_str()
                })
            }
            Self::KebabCase => field.replace('_', "-"),
            Self::ScreamingKebabCase => Self::ScreamingSnakeCase
                .apply_to_field(field)
                .replace('_', "-"),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_rules_match_serde_for_snake_case_fields() {
        let cases = [
            ("lowercase", "user_id"),
            ("UPPERCASE", "USER_ID"),
            ("PascalCase", "UserId"),
            ("camelCase", "userId"),
            ("snake_case", "user_id"),
            ("SCREAMING_SNAKE_CASE", "USER_ID"),
            ("kebab-case", "user-id"),
            ("SCREAMING-KEBAB-CASE", "USER-ID"),
        ];
        for (name, expected) in cases {
            let rule = RenameRule::from_name(name).unwrap();
            assert_eq!(rule.apply_to_field("user_id"), expected, "rule {name}");
        }
    }

    #[test]
    fn test_irregular_names_keep_their_casing() {
        let camel = RenameRule::CamelCase;
        let pascal = RenameRule::PascalCase;
        assert_eq!(camel.apply_to_field("userID"), "userID");
        assert_eq!(pascal.apply_to_field("userID"), "UserID");
        assert_eq!(camel.apply_to_field("http2_url"), "http2Url");
        assert_eq!(pascal.apply_to_field("http2_url"), "Http2Url");
        assert_eq!(camel.apply_to_field("XMLHttp_request"), "xMLHttpRequest");
        assert_eq!(camel.apply_to_field("__private"), "private");
    }

    #[test]
    fn test_unknown_rule() {
        assert_eq!(RenameRule::from_name("Title Case"), None);
    }
}
