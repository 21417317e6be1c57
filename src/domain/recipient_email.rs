use std::fmt;

/// Email address identifying a recipient.
///
/// Only emptiness is checked: the provider is the authority on what it accepts, and a rejected
/// address ends up as a `failed` membership rather than a dropped message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct RecipientEmail(String);

impl RecipientEmail {
    pub fn parse(email: String) -> Result<RecipientEmail, String> {
        let email = email.trim();
        if email.is_empty() {
            return Err(String::from("recipient email cannot be empty"));
        }

        Ok(Self(email.to_string()))
    }
}

impl AsRef<str> for RecipientEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::RecipientEmail;
    use claim::{assert_err, assert_ok};
    use fake::{faker::internet::en::SafeEmail, Fake};

    #[test]
    fn empty_email_is_rejected() {
        let email = "".to_string();

        assert_err!(RecipientEmail::parse(email));
    }

    #[test]
    fn whitespace_only_email_is_rejected() {
        let email = "   ".to_string();

        assert_err!(RecipientEmail::parse(email));
    }

    #[test]
    fn bare_identifier_is_accepted() {
        assert_ok!(RecipientEmail::parse("x".to_string()));
    }

    #[test]
    fn surrounding_whitespace_is_stripped() {
        let email = RecipientEmail::parse("  a@b.com\n".to_string()).unwrap();

        assert_eq!(email.as_ref(), "a@b.com");
        assert_eq!(email, RecipientEmail::parse("a@b.com".to_string()).unwrap());
    }

    #[test]
    fn email_valid_is_accepted() {
        let email: String = SafeEmail().fake();

        let parsed = RecipientEmail::parse(email.clone()).unwrap();

        assert_eq!(parsed.as_ref(), email);
    }
}
