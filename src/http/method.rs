use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Common request methods, for registering routes without string literals.
///
/// Dispatch itself works on the raw method token, so a request carrying a
/// method outside this list still dispatches (and usually ends in NotFound).
#[derive(EnumString, AsRefStr, IntoStaticStr, Display, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Method {
    #[strum(serialize = "GET")]
    GET,
    #[strum(serialize = "HEAD")]
    HEAD,
    #[strum(serialize = "POST")]
    POST,
    #[strum(serialize = "PUT")]
    PUT,
    #[strum(serialize = "PATCH")]
    PATCH,
    #[strum(serialize = "DELETE")]
    DELETE,
    #[strum(serialize = "OPTIONS")]
    OPTIONS,
}
