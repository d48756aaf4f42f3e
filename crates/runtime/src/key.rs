use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque identity of one document's interpreter session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
	pub fn new(key: impl AsRef<str>) -> Self {
		Self(Arc::from(key.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SessionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SessionKey {
	fn from(key: &str) -> Self {
		Self::new(key)
	}
}

impl From<String> for SessionKey {
	fn from(key: String) -> Self {
		Self(Arc::from(key))
	}
}

impl AsRef<str> for SessionKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for SessionKey {
	fn borrow(&self) -> &str {
		&self.0
	}
}
