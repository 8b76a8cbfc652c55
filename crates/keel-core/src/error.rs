mod adhoc;
mod alias_not_found;
mod driver;
mod entity_column_not_found;
mod entity_metadata_not_found;
mod entity_not_found;
mod invalid_parameter;
mod invalid_schema;
mod lock_not_supported_on_given_driver;
mod missing_delete_date_column;
mod no_version_or_update_date_column;
mod offset_without_limit_not_supported;
mod optimistic_lock_can_not_be_used;
mod optimistic_lock_version_mismatch;
mod pessimistic_lock_transaction_required;
mod relation_not_found;
mod unsupported_feature;
mod update_values_missing;

use adhoc::AdhocError;
use alias_not_found::AliasNotFound;
use driver::DriverError;
use entity_column_not_found::EntityColumnNotFound;
use entity_metadata_not_found::EntityMetadataNotFound;
use entity_not_found::EntityNotFound;
use invalid_parameter::InvalidParameter;
use invalid_schema::InvalidSchema;
use lock_not_supported_on_given_driver::LockNotSupportedOnGivenDriver;
use missing_delete_date_column::MissingDeleteDateColumn;
use no_version_or_update_date_column::NoVersionOrUpdateDateColumn;
use offset_without_limit_not_supported::OffsetWithoutLimitNotSupported;
use optimistic_lock_can_not_be_used::OptimisticLockCanNotBeUsed;
pub use optimistic_lock_version_mismatch::OptimisticLockVersionMismatch;
use pessimistic_lock_transaction_required::PessimisticLockTransactionRequired;
use relation_not_found::RelationNotFound;
use std::sync::Arc;
use unsupported_feature::UnsupportedFeature;
use update_values_missing::UpdateValuesMissing;

/// Returns early with an ad-hoc error built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::from_args(format_args!($($arg)*)))
    };
}

/// Builds an ad-hoc error from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::from_args(format_args!($($arg)*))
    };
}

/// An error that can occur while building or executing a query.
///
/// The error is a single pointer wide. Context may be layered on top of a
/// root cause with [`Error::context`]; the chain is displayed outermost
/// first.
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

impl Error {
    /// Adds context to this error.
    ///
    /// Context is displayed in reverse order: the most recently added context is shown first,
    /// followed by earlier context, ending with the root cause.
    #[inline(always)]
    pub fn context(self, consequent: impl IntoError) -> Error {
        self.context_impl(consequent.into_error())
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let kind = match consequent.inner {
            Some(inner) => match Arc::try_unwrap(inner) {
                Ok(inner) => inner.kind,
                Err(shared) => ErrorKind::Adhoc(AdhocError::new(shared.kind.to_string())),
            },
            None => ErrorKind::Unknown,
        };

        Error {
            inner: Some(Arc::new(ErrorInner {
                kind,
                cause: Some(self),
            })),
        }
    }

    /// Returns the innermost error of the context chain.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Some(cause) = err.inner.as_ref().and_then(|inner| inner.cause.as_ref()) {
            err = cause;
        }
        err
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }

    /// Returns `true` if any error in the context chain satisfies `f`.
    fn any_kind(&self, f: impl Fn(&ErrorKind) -> bool) -> bool {
        self.chain().any(|err| f(err.kind()))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Driver(err) => Some(err),
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Anyhow(anyhow::Error),
    Adhoc(AdhocError),
    AliasNotFound(AliasNotFound),
    Driver(DriverError),
    EntityColumnNotFound(EntityColumnNotFound),
    EntityMetadataNotFound(EntityMetadataNotFound),
    EntityNotFound(EntityNotFound),
    InvalidParameter(InvalidParameter),
    InvalidSchema(InvalidSchema),
    LockNotSupportedOnGivenDriver(LockNotSupportedOnGivenDriver),
    MissingDeleteDateColumn(MissingDeleteDateColumn),
    NoVersionOrUpdateDateColumn(NoVersionOrUpdateDateColumn),
    OffsetWithoutLimitNotSupported(OffsetWithoutLimitNotSupported),
    OptimisticLockCanNotBeUsed(OptimisticLockCanNotBeUsed),
    OptimisticLockVersionMismatch(OptimisticLockVersionMismatch),
    PessimisticLockTransactionRequired(PessimisticLockTransactionRequired),
    RelationNotFound(RelationNotFound),
    UnsupportedFeature(UnsupportedFeature),
    UpdateValuesMissing(UpdateValuesMissing),
    Unknown,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            AliasNotFound(err) => core::fmt::Display::fmt(err, f),
            Driver(err) => core::fmt::Display::fmt(err, f),
            EntityColumnNotFound(err) => core::fmt::Display::fmt(err, f),
            EntityMetadataNotFound(err) => core::fmt::Display::fmt(err, f),
            EntityNotFound(err) => core::fmt::Display::fmt(err, f),
            InvalidParameter(err) => core::fmt::Display::fmt(err, f),
            InvalidSchema(err) => core::fmt::Display::fmt(err, f),
            LockNotSupportedOnGivenDriver(err) => core::fmt::Display::fmt(err, f),
            MissingDeleteDateColumn(err) => core::fmt::Display::fmt(err, f),
            NoVersionOrUpdateDateColumn(err) => core::fmt::Display::fmt(err, f),
            OffsetWithoutLimitNotSupported(err) => core::fmt::Display::fmt(err, f),
            OptimisticLockCanNotBeUsed(err) => core::fmt::Display::fmt(err, f),
            OptimisticLockVersionMismatch(err) => core::fmt::Display::fmt(err, f),
            PessimisticLockTransactionRequired(err) => core::fmt::Display::fmt(err, f),
            RelationNotFound(err) => core::fmt::Display::fmt(err, f),
            UnsupportedFeature(err) => core::fmt::Display::fmt(err, f),
            UpdateValuesMissing(err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown keel error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

/// Trait for types that can be converted into an Error.
pub trait IntoError {
    /// Converts this type into an Error.
    fn into_error(self) -> Error;
}

impl IntoError for Error {
    #[inline(always)]
    fn into_error(self) -> Error {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::Value;

    #[test]
    fn error_size() {
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn error_from_args() {
        let err = Error::from_args(format_args!("test error: {}", 42));
        assert_eq!(err.to_string(), "test error: 42");
    }

    #[test]
    fn error_chain_display() {
        let root = Error::alias_not_found("photo");
        let top = err!("building select");

        let chained = root.context(top);
        assert_eq!(
            chained.to_string(),
            "building select: \"photo\" alias was not found. Maybe you forgot to join it?"
        );
        assert!(chained.is_alias_not_found());
        assert!(chained.root().is_alias_not_found());
    }

    #[test]
    fn anyhow_bridge() {
        let anyhow_err = anyhow::anyhow!("something failed");
        let our_err: Error = anyhow_err.into();
        assert_eq!(our_err.to_string(), "something failed");
    }

    #[test]
    fn optimistic_lock_mismatch_carries_versions() {
        let err = Error::optimistic_lock_version_mismatch("Post", Value::I64(1), Value::I64(2));
        assert_eq!(
            err.to_string(),
            "the optimistic lock on entity Post failed, version 1 was expected, but is actually 2"
        );

        let mismatch = err.as_optimistic_lock_version_mismatch().unwrap();
        assert_eq!(mismatch.entity(), "Post");
        assert_eq!(mismatch.expected(), &Value::I64(1));
        assert_eq!(mismatch.actual(), &Value::I64(2));
    }

    #[test]
    fn entity_not_found_message() {
        let err = Error::entity_not_found("User", "matching query");
        assert_eq!(
            err.to_string(),
            "could not find any entity of type \"User\" matching: matching query"
        );
        assert!(err.is_entity_not_found());
        assert!(!err.is_driver());
    }

    #[test]
    fn driver_error_exposes_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connection reset");
        let err = Error::driver(io);
        assert!(err.is_driver());
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "connection reset");
    }
}
