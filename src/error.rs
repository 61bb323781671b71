use derive_more::Display;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Display)]
pub struct UnknownError(BoxedError);

impl std::error::Error for UnknownError {}

impl UnknownError {
    pub fn new(err: BoxedError) -> Self {
        Self(err)
    }
}

impl From<sqlx::error::Error> for UnknownError {
    fn from(err: sqlx::error::Error) -> Self {
        Self::new(err.into())
    }
}

pub mod app {
    use derive_more::Display;
    use salvo::{prelude::StatusError, writer::Json, Piece};
    use serde::Serialize;

    use super::{
        http::ErrorResponse,
        persistence::PersistenceError,
        resource::{NotFoundError, ValidationError},
        security::{AuthenticationError, ForbiddenError, UnauthorizedError},
        service::ServiceError,
    };

    #[derive(Debug, Display, Serialize)]
    pub enum ApplicationError<R> {
        Authentication(AuthenticationError),
        Unauthorized(UnauthorizedError),
        Forbidden(ForbiddenError),
        Validation(ValidationError<R>),
        NotFound(NotFoundError),
        Service(ServiceError),
        Persistence(PersistenceError),
    }

    impl<R: std::fmt::Debug> std::error::Error for ApplicationError<R> {}

    impl<R> From<AuthenticationError> for ApplicationError<R> {
        fn from(err: AuthenticationError) -> Self {
            Self::Authentication(err)
        }
    }

    impl<R> From<UnauthorizedError> for ApplicationError<R> {
        fn from(err: UnauthorizedError) -> Self {
            Self::Unauthorized(err)
        }
    }

    impl<R> From<ForbiddenError> for ApplicationError<R> {
        fn from(err: ForbiddenError) -> Self {
            Self::Forbidden(err)
        }
    }

    impl<R> From<ValidationError<R>> for ApplicationError<R> {
        fn from(err: ValidationError<R>) -> Self {
            Self::Validation(err)
        }
    }

    impl<R> From<NotFoundError> for ApplicationError<R> {
        fn from(err: NotFoundError) -> Self {
            Self::NotFound(err)
        }
    }

    impl<R> From<ServiceError> for ApplicationError<R> {
        fn from(err: ServiceError) -> Self {
            Self::Service(err)
        }
    }

    impl<R> From<PersistenceError> for ApplicationError<R> {
        fn from(err: PersistenceError) -> Self {
            Self::Persistence(err)
        }
    }

    impl<R: Serialize + Send> Piece for ApplicationError<R> {
        fn render(self, res: &mut salvo::Response) {
            let status = match &self {
                ApplicationError::Persistence(PersistenceError::Conflict) => {
                    StatusError::conflict().with_summary("Resource was modified concurrently")
                }
                ApplicationError::Persistence(_) => StatusError::service_unavailable(),
                ApplicationError::Validation(_) => StatusError::bad_request(),
                ApplicationError::Authentication(_) | ApplicationError::Unauthorized(_) => {
                    StatusError::unauthorized()
                }
                ApplicationError::Forbidden(_) => StatusError::forbidden(),
                ApplicationError::NotFound(_) => StatusError::not_found(),
                ApplicationError::Service(_) => StatusError::internal_server_error(),
            };
            if let ApplicationError::Service(err) = &self {
                tracing::error!(service = %err.service, "{}", err.message);
            }
            res.render(Json(ErrorResponse::from_status_error(&status, self)));
            res.set_status_error(status);
        }
    }
}

pub mod service {
    use derive_more::Display;
    use serde::Serialize;

    use crate::error::UnknownError;

    #[derive(Debug, Display)]
    pub enum DispatchError {
        #[display(fmt = "Dispatched operation timed out in {_0:?}")]
        Timeout(Option<std::time::Duration>),
        #[display(fmt = "IO error dispatching {_0}")]
        IO(std::io::Error),
        #[display(fmt = "Unknown dispatch error {_0}")]
        Unknown(UnknownError),
    }

    impl std::error::Error for DispatchError {}

    impl From<std::io::Error> for DispatchError {
        fn from(err: std::io::Error) -> Self {
            Self::IO(err)
        }
    }

    impl From<reqwest::Error> for DispatchError {
        fn from(err: reqwest::Error) -> Self {
            if err.is_timeout() {
                return Self::Timeout(None);
            }
            Self::Unknown(UnknownError::new(err.into()))
        }
    }

    /// External collaborator that failed to serve a request.
    #[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ServiceKind {
        #[display(fmt = "storage")]
        Storage,
        #[display(fmt = "identity")]
        Identity,
        #[display(fmt = "token")]
        Token,
        #[display(fmt = "language_model")]
        LanguageModel,
        #[display(fmt = "transcription")]
        Transcription,
        #[display(fmt = "media")]
        Media,
        #[display(fmt = "payment")]
        Payment,
        #[display(fmt = "pipeline")]
        Pipeline,
    }

    #[derive(Debug, Display, Clone, Serialize)]
    #[display(fmt = "{service} service error: {message}")]
    pub struct ServiceError {
        pub service: ServiceKind,
        pub message: String,
    }

    impl std::error::Error for ServiceError {}

    impl ServiceError {
        pub fn new(service: ServiceKind, message: impl Into<String>) -> Self {
            Self {
                service,
                message: message.into(),
            }
        }

        pub fn dispatch(service: ServiceKind, err: DispatchError) -> Self {
            Self::new(service, err.to_string())
        }
    }

    #[derive(Debug, Display)]
    pub enum UploadError {
        #[display(fmt = "upload exceeds {limit} bytes")]
        TooLarge { limit: u64 },
        #[display(fmt = "could not read upload body: {_0}")]
        Body(String),
        #[display(fmt = "{_0}")]
        Service(ServiceError),
    }

    impl std::error::Error for UploadError {}

    impl From<ServiceError> for UploadError {
        fn from(err: ServiceError) -> Self {
            Self::Service(err)
        }
    }
}

pub mod persistence {
    use std::io;

    use derive_more::Display;
    use serde::Serialize;

    use super::{service::DispatchError, UnknownError};

    pub type SqlState = String;

    #[derive(Debug, Display)]
    pub enum PersistenceError {
        #[display(fmt = "database persistence error: SQLSTATE {_0:?}")]
        Database(Option<SqlState>),
        #[display(fmt = "persistence layer connection error: {_0}")]
        Connection(DispatchError),
        #[display(fmt = "PersistenceError data not found")]
        NotFound,
        /// Row changed since it was read.
        #[display(fmt = "PersistenceError version conflict")]
        Conflict,
        #[display(fmt = "PersistenceError decoding data")]
        DecodeData,
        #[display(fmt = "PersistenceError data migration")]
        DataMigration,
        #[display(fmt = "unknown persistence error: {_0}")]
        Unknown(UnknownError),
    }

    impl std::error::Error for PersistenceError {}

    impl Serialize for PersistenceError {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_none()
        }
    }

    type SqlxError = sqlx::error::Error;

    impl From<SqlxError> for PersistenceError {
        fn from(err: SqlxError) -> Self {
            match err {
                SqlxError::Configuration(_) => {
                    Self::Connection(DispatchError::IO(io::ErrorKind::InvalidInput.into()))
                }
                SqlxError::Database(db) => Self::Database(db.code().map(|code| code.into())),
                SqlxError::Io(io) => Self::Connection(DispatchError::IO(io)),
                SqlxError::Tls(_) => {
                    Self::Connection(DispatchError::IO(io::ErrorKind::ConnectionRefused.into()))
                }
                SqlxError::Protocol(msg) => Self::Connection(DispatchError::IO(io::Error::new(
                    io::ErrorKind::InvalidData,
                    msg,
                ))),
                SqlxError::RowNotFound => Self::NotFound,
                SqlxError::TypeNotFound { .. } => Self::DecodeData,
                SqlxError::ColumnIndexOutOfBounds { .. } => Self::DecodeData,
                SqlxError::ColumnNotFound(_) => Self::NotFound,
                SqlxError::ColumnDecode { .. } => Self::DecodeData,
                SqlxError::Decode(_) => Self::DecodeData,
                SqlxError::PoolTimedOut => Self::Connection(DispatchError::Timeout(None)),
                SqlxError::PoolClosed => {
                    Self::Connection(DispatchError::IO(io::ErrorKind::NotConnected.into()))
                }
                SqlxError::WorkerCrashed => {
                    tracing::error!("FATAL: sqlx background worker error, {err}");
                    panic!("sqlx background worker error: {err}");
                }
                SqlxError::Migrate(_) => Self::DataMigration,
                _ => PersistenceError::Unknown(err.into()),
            }
        }
    }
}

pub mod resource {
    use derive_more::{Display, Error};
    use serde::{Deserialize, Serialize};

    use crate::base::ResourceID;

    #[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum ValidationErrorKind {
        /// When a required property is missing.
        Required,
        /// Maximum inclusive size exceeded.
        MaxLength(u64),
        /// The input value doesn't match any of specified options.
        #[display(fmt = "Validation error kind: unknown_variant, expected one of {_0:?}")]
        UnknownVariant(Vec<String>),
        /// Input value already exists.
        AlreadyExists,
        /// Generic kind.
        Invalid,
    }

    impl std::error::Error for ValidationErrorKind {}

    #[derive(Debug, Error, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ValidationError<R> {
        /// Resource value
        pub resource: R,
        /// Name of the resource
        pub resource_type: &'static str,
        /// Invalid resource fields
        pub fields: Vec<ValidationFieldError>,
    }

    impl<R> ValidationError<R> {
        pub fn from_resource(resource: R, fields: Vec<ValidationFieldError>) -> Self
        where
            R: ResourceID,
        {
            Self {
                resource,
                resource_type: R::resource_id(),
                fields,
            }
        }
    }

    impl<R> std::fmt::Display for ValidationError<R> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!(
                "Invalid resource {}, fields {:?}",
                self.resource_type, self.fields
            ))
        }
    }

    #[derive(Debug, Display, Error, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[display(fmt = "{path}: {value:?}, {kinds:?}")]
    pub struct ValidationFieldError {
        /// Resource field path with invalid value
        pub path: String,
        /// Displayed invalid value
        pub value: String,
        /// Value type id
        pub type_id: &'static str,
        /// Kinds of validation errors
        pub kinds: Vec<ValidationErrorKind>,
    }

    impl ValidationFieldError {
        pub fn new(
            type_id: &'static str,
            value: String,
            path: String,
            kinds: Vec<ValidationErrorKind>,
        ) -> Self {
            Self {
                path,
                type_id,
                value,
                kinds,
            }
        }
    }

    #[derive(Debug, Display, Clone, PartialEq, Eq, Serialize)]
    #[display(fmt = "Resource {resource_type} of id {resource_id} not found")]
    pub struct NotFoundError {
        pub resource_type: &'static str,
        pub resource_id: String,
    }

    impl std::error::Error for NotFoundError {}

    impl NotFoundError {
        pub fn new<T: ResourceID>(resource_id: impl ToString) -> Self {
            Self {
                resource_type: T::resource_id(),
                resource_id: resource_id.to_string(),
            }
        }
    }
}

pub mod security {
    use derive_more::Display;
    use serde::Serialize;

    /// Unauthorized access to a resource.
    ///
    /// The user is unauthorized to access the resource.
    #[derive(Debug, Display, Serialize)]
    pub enum UnauthorizedError {
        /// Authentication token is not present.
        #[display(fmt = "token_not_present")]
        TokenNotPresent,

        /// Authentication token is malformatted.
        ///
        /// The token is no formated as the required authentication scheme
        #[display(fmt = "malformatted_token")]
        MalformattedToken,

        /// Authentication token is invalid.
        #[display(fmt = "invalid_token")]
        InvalidToken,
    }

    #[derive(Debug, Display, Serialize)]
    pub enum AuthenticationError {
        /// Attempt to authenticate with an identity token that could not be verified.
        #[display(fmt = "invalid_credential")]
        InvalidCredential,
    }

    #[derive(Debug, Display, Serialize)]
    pub enum ForbiddenError {
        /// Access denied.
        ///
        /// The user is authenticated, however does not have access to the requested resource.
        #[display(fmt = "access_denied")]
        AccessDenied,

        /// System default resources are read-only.
        #[display(fmt = "default_resource")]
        DefaultResource,
    }
}

pub mod http {
    use derive_more::{Display, Error};
    use salvo::{http::ParseError, prelude::StatusError, writer::Json, Piece, Response};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Display, Clone, Error, Serialize, Deserialize)]
    pub enum BadRequest {
        InvalidContent,
        #[display(fmt = "InvalidParam({_0})")]
        InvalidParam(#[error(not(source))] String),
        #[display(fmt = "MissingField({_0})")]
        MissingField(#[error(not(source))] String),
    }

    #[derive(Debug, Display, Clone, Error, Serialize, Deserialize)]
    #[display(fmt = "Response error: {title}, {message}")]
    pub struct ErrorResponse<T> {
        pub title: String,
        pub message: String,
        pub error: T,
    }

    impl<T> ErrorResponse<T> {
        pub fn from_status_error(status: &StatusError, err: T) -> Self {
            Self {
                title: status.name.clone(),
                message: status
                    .summary
                    .clone()
                    .unwrap_or_else(|| status.name.clone()),
                error: err,
            }
        }
    }

    impl From<ParseError> for BadRequest {
        fn from(_: ParseError) -> Self {
            BadRequest::InvalidContent
        }
    }

    impl Piece for BadRequest {
        fn render(self, res: &mut Response) {
            let status = StatusError::bad_request();
            res.render(Json(ErrorResponse::from_status_error(&status, self)));
            res.set_status_error(status);
        }
    }
}
