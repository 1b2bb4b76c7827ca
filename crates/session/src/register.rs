use {serde::Serialize, tether_auth::AccessToken};

/// First frame sent on the hub connection, announcing the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationFrame<'a> {
    pub command: &'static str,
    pub hostname: &'a str,
    pub port: u16,
    pub accesstoken: &'a str,
    pub dbid: &'static str,
}

impl<'a> RegistrationFrame<'a> {
    pub fn for_token(token: &'a AccessToken) -> Self {
        Self {
            command: "register",
            hostname: &token.host,
            port: token.port,
            accesstoken: &token.token,
            dbid: "nil",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_in_wire_order() {
        let token = AccessToken {
            token: "AT1".into(),
            host: "h1".into(),
            kind: "x".into(),
            port: 1234,
            expiration: 999,
        };
        assert_eq!(
            RegistrationFrame::for_token(&token).to_json().unwrap(),
            r#"{"command":"register","hostname":"h1","port":1234,"accesstoken":"AT1","dbid":"nil"}"#
        );
    }
}
