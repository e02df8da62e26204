use schema::UserId;
use serde_json::{Map, Value};

const BEARER_SCHEME: &str = "Bearer";

#[derive(Debug, Clone, PartialEq, Eq)]
struct UserTokens {
    user_id: UserId,
    tokens: Vec<String>,
}

/// Static mapping of users to the bearer tokens they may present.
///
/// Users are scanned in the order they were configured. A token listed under
/// more than one user resolves to the first of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTable {
    users: Vec<UserTokens>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `{"user-id": ["token", ...], ...}`.
    ///
    /// A `null` token list configures the user with no tokens; `null` entries
    /// inside a list are dropped since an empty token never matches.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: Map<String, Value> = serde_json::from_str(raw)?;
        let mut table = Self::new();
        for (user_id, tokens) in parsed {
            let tokens: Option<Vec<Option<String>>> = serde_json::from_value(tokens)?;
            table.insert(
                UserId::new(user_id),
                tokens.into_iter().flatten().flatten(),
            );
        }
        Ok(table)
    }

    pub fn insert<I, T>(&mut self, user_id: UserId, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tokens = tokens.into_iter().map(Into::into);
        match self.users.iter_mut().find(|entry| entry.user_id == user_id) {
            Some(entry) => entry.tokens.extend(tokens),
            None => self.users.push(UserTokens {
                user_id,
                tokens: tokens.collect(),
            }),
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn user_for_token(&self, token: &str) -> Option<&UserId> {
        if token.is_empty() {
            return None;
        }
        self.users
            .iter()
            .find(|entry| {
                entry
                    .tokens
                    .iter()
                    .any(|valid| constant_time_eq(valid.as_bytes(), token.as_bytes()))
            })
            .map(|entry| &entry.user_id)
    }

    /// Resolves the raw `Authorization` header value to a user.
    pub fn authenticate(&self, authorization: Option<&str>) -> Option<UserId> {
        let token = bearer_token(authorization)?;
        self.user_for_token(token).cloned()
    }
}

/// Extracts `<token>` from `Bearer <token>`.
///
/// The header must split on single spaces into exactly two parts, so extra
/// segments, doubled spaces, a different scheme or an empty token all count
/// as no token.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let mut parts = authorization?.split(' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || scheme != BEARER_SCHEME || token.is_empty() {
        return None;
    }
    Some(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TokenTable {
        TokenTable::from_json(r#"{"user-id":["1234","rotated"],"user-id2":["second-token"]}"#)
            .unwrap()
    }

    #[test]
    fn from_json_loads_every_user() {
        let table = sample_table();
        assert_eq!(table.user_count(), 2);
        assert_eq!(
            table.user_for_token("rotated"),
            Some(&UserId::from("user-id"))
        );
    }

    #[test]
    fn from_json_rejects_malformed_tables() {
        assert!(TokenTable::from_json("totally-not-valid-json-scrub").is_err());
        assert!(TokenTable::from_json(r#"["1234"]"#).is_err());
        assert!(TokenTable::from_json(r#"{"user-id":"1234"}"#).is_err());
        assert!(TokenTable::from_json(r#"{"user-id":[1234]}"#).is_err());
    }

    #[test]
    fn empty_object_is_a_valid_table() {
        let table = TokenTable::from_json("{}").unwrap();
        assert_eq!(table.user_count(), 0);
        assert_eq!(table.authenticate(Some("Bearer 1234")), None);
    }

    #[test]
    fn null_token_list_configures_user_without_tokens() {
        let table =
            TokenTable::from_json(r#"{"idle":null,"user-id":["1234",null]}"#).unwrap();
        assert_eq!(table.user_count(), 2);
        assert_eq!(
            table.authenticate(Some("Bearer 1234")),
            Some(UserId::from("user-id"))
        );
        assert_eq!(table.authenticate(Some("Bearer null")), None);
    }

    #[test]
    fn authenticate_resolves_each_user() {
        let table = sample_table();
        assert_eq!(
            table.authenticate(Some("Bearer 1234")),
            Some(UserId::from("user-id"))
        );
        assert_eq!(
            table.authenticate(Some("Bearer second-token")),
            Some(UserId::from("user-id2"))
        );
    }

    #[test]
    fn authenticate_rejects_unknown_token() {
        assert_eq!(sample_table().authenticate(Some("Bearer nope")), None);
    }

    #[test]
    fn bearer_token_requires_exact_shape() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(None), None);
        assert_eq!(bearer_token(Some("")), None);
        assert_eq!(bearer_token(Some("Bearer")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("bearer abc")), None);
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer abc def")), None);
        assert_eq!(bearer_token(Some("Bearer  abc")), None);
        assert_eq!(bearer_token(Some("no good token")), None);
    }

    #[test]
    fn empty_configured_token_never_matches_missing_header() {
        let mut table = TokenTable::new();
        table.insert(UserId::from("blank"), [""]);
        assert_eq!(table.authenticate(None), None);
        assert_eq!(table.authenticate(Some("Bearer ")), None);
    }

    #[test]
    fn insert_merges_tokens_for_existing_user() {
        let mut table = TokenTable::new();
        table.insert(UserId::from("u"), ["a"]);
        table.insert(UserId::from("u"), ["b"]);
        assert_eq!(table.user_count(), 1);
        assert_eq!(table.authenticate(Some("Bearer b")), Some(UserId::from("u")));
    }

    #[test]
    fn duplicate_token_resolves_to_first_configured_user() {
        let table =
            TokenTable::from_json(r#"{"first":["shared"],"second":["shared"]}"#).unwrap();
        assert_eq!(
            table.authenticate(Some("Bearer shared")),
            Some(UserId::from("first"))
        );
    }
}
