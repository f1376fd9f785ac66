//! Intruder core: pure request templating, payload encoding and enumeration.
mod encoder;
mod product;
mod request;
mod selection;
mod template;

pub use encoder::{
    Base64Encoder, Base64UrlEncoder, CookieEncoder, Encoder, EncoderKind, IdentityEncoder,
    JsonEncoder, UrlEncoder, XmlEncoder,
};
pub use product::{combination_count, CartesianProduct};
pub use request::{parse_request, ParsedRequest, RequestParseError, TargetError};
pub use selection::{
    HighlightTag, Selection, SelectionAccepted, SelectionError, SelectionSet, Span, TextPosition,
};
pub use template::{build_template, PreparedTemplate, Segment, Template, TemplateError};
