use super::prelude::*;
use crate::arbiter::{ClaimOutcome, Rejection};

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u64>,
}

impl Output {
    fn rejected(message: &'static str, time_remaining: Option<u64>) -> Self {
        Self {
            success: false,
            message,
            coupon: None,
            time_remaining,
        }
    }
}

impl From<ClaimOutcome> for Output {
    fn from(outcome: ClaimOutcome) -> Self {
        match outcome {
            ClaimOutcome::Granted { code } => Self {
                success: true,
                message: "Coupon claimed successfully!",
                coupon: Some(code),
                time_remaining: None,
            },
            ClaimOutcome::Rejected(Rejection::Cooldown { seconds_remaining }) => Self::rejected(
                "You have already claimed a coupon recently.",
                Some(seconds_remaining),
            ),
            ClaimOutcome::Rejected(Rejection::Exhausted) => Self::rejected(
                "Sorry, there are no more coupons available at this time.",
                None,
            ),
            ClaimOutcome::Rejected(Rejection::InternalError) => Self::rejected(
                "An error occurred while claiming your coupon. Please try again later.",
                None,
            ),
        }
    }
}

pub fn service(config: &Config) -> impl HttpServiceFactory + 'static {
    web::resource("/claim")
        .wrap(config.cors())
        .route(web::post().to(claim))
}

async fn claim(identity: Identity, arbiter: web::Data<ClaimArbiter>) -> HttpResponse {
    let outcome = arbiter
        .claim(&identity.id, &identity.source_address)
        .await;
    let mut resp = HttpResponse::Ok();
    if let Some(cookie) = identity.cookie() {
        resp.cookie(cookie);
    }
    resp.json(Output::from(outcome))
}
