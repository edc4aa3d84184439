use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] db::Error),
    #[error("Coupon code already exists")]
    DuplicateCode,
    #[error("Coupon code is required")]
    MissingCode,
}

pub type Result<T> = std::result::Result<T, Error>;

/// `{"success": false, "message": ...}`
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ErrorBody {
    pub fn build<E: ResponseError>(e: &E) -> HttpResponse {
        HttpResponse::build(e.status_code()).json(ErrorBody {
            success: false,
            message: e.to_string(),
        })
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::DuplicateCode | Error::MissingCode => StatusCode::BAD_REQUEST,
            Error::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Error::Db(error) => {
                // store details stay in the logs
                tracing::error!("{}", error);
                HttpResponse::build(self.status_code()).json(ErrorBody {
                    success: false,
                    message: "An internal error occurred.".to_owned(),
                })
            }
            _ => ErrorBody::build(self),
        }
    }
}
