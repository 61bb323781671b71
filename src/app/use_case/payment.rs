use serde_json::Value;
use sqlx::PgPool;

use crate::{
    app::resource::payment::{
        CheckoutSessionsResponse, SubscriptionStatusResponse, WebhookResponse,
    },
    domain::{
        entity::{
            iam::{Subscription, User},
            Entity,
        },
        service::{CheckoutRequest, PaymentGateway, PlanPrices},
    },
    error::{
        app::ApplicationError,
        resource::{ValidationError, ValidationErrorKind, ValidationFieldError},
        service::{ServiceError, ServiceKind},
    },
    infra::database::repository,
};

/// Subscription checkout URLs for both paid plans.
pub async fn create_checkout_sessions<G>(
    gateway: &G,
    user: &User,
    frontend_url: &str,
) -> Result<CheckoutSessionsResponse, ApplicationError<()>>
where
    G: PaymentGateway + ?Sized,
{
    let request = |plan: Subscription| {
        let price_id = gateway
            .prices()
            .price(plan)
            .filter(|price| !price.is_empty())
            .ok_or_else(|| {
                ServiceError::new(
                    ServiceKind::Payment,
                    format!("no price configured for plan {plan}"),
                )
            })?;
        Ok::<_, ServiceError>(CheckoutRequest {
            email: user.email(),
            user_id: user.ident(),
            plan,
            price_id,
            success_url: format!("{frontend_url}/dashboard"),
            cancel_url: format!("{frontend_url}/pricing?canceled=true"),
        })
    };
    let premium = request(Subscription::Premium)?;
    let ultra = request(Subscription::Ultra)?;

    let (premium, ultra) = tokio::try_join!(
        gateway.create_checkout_session(&premium),
        gateway.create_checkout_session(&ultra),
    )?;

    Ok(CheckoutSessionsResponse { premium, ultra })
}

pub fn subscription_status(user: &User) -> SubscriptionStatusResponse {
    SubscriptionStatusResponse {
        subscription: user.subscription(),
        credits: user.credits(),
        email: user.email().clone(),
    }
}

fn non_empty(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(String::from)
}

/// Plan bought with `price_id` and the credits of one paid period.
pub fn plan_credit(prices: &PlanPrices, price_id: Option<&str>) -> Option<(Subscription, i32)> {
    let plan = prices.plan(price_id?)?;
    Some((plan, plan.period_credits()))
}

pub fn is_paid(session: &Value) -> bool {
    session["payment_status"].as_str() == Some("paid")
}

/// Whether an invoice renews a subscription. The first invoice is credited through its checkout.
pub fn is_renewal(invoice: &Value) -> bool {
    invoice["billing_reason"].as_str() != Some("subscription_create")
}

pub fn checkout_email(session: &Value) -> Option<String> {
    non_empty(&session["customer_email"]).or_else(|| non_empty(&session["customer_details"]["email"]))
}

pub fn invoice_price_id(invoice: &Value) -> Option<String> {
    non_empty(&invoice["lines"]["data"][0]["price"]["id"])
}

/// Grants the plan bought with `price_id` to the account of `email`.
async fn credit_purchase(
    pool: &PgPool,
    prices: &PlanPrices,
    email: Option<String>,
    price_id: Option<String>,
) -> Result<(), ApplicationError<()>> {
    let Some((plan, credits)) = plan_credit(prices, price_id.as_deref()) else {
        tracing::warn!(price_id = ?price_id, "payment for unknown price");
        return Ok(());
    };
    let Some(email) = email else {
        tracing::warn!(plan = %plan, "payment without customer email");
        return Ok(());
    };

    match repository::user::add_credits_by_email(pool, &email, credits, plan).await? {
        Some((user_id, balance)) => tracing::info!(
            user_id = %user_id,
            plan = %plan,
            credits = balance,
            "subscription credited"
        ),
        None => tracing::warn!(email = %email, "payment for unknown user"),
    }
    Ok(())
}

async fn checkout_completed<G>(
    pool: &PgPool,
    gateway: &G,
    session: &Value,
) -> Result<(), ApplicationError<()>>
where
    G: PaymentGateway + ?Sized,
{
    if !is_paid(session) {
        tracing::info!(session = ?session["id"], "checkout completed without payment");
        return Ok(());
    }

    let price_id = match session["id"].as_str() {
        Some(id) => gateway.session_price_id(id).await?,
        None => None,
    };
    credit_purchase(pool, gateway.prices(), checkout_email(session), price_id).await
}

async fn invoice_paid<G>(
    pool: &PgPool,
    gateway: &G,
    invoice: &Value,
) -> Result<(), ApplicationError<()>>
where
    G: PaymentGateway + ?Sized,
{
    if !is_renewal(invoice) {
        return Ok(());
    }

    let email = match non_empty(&invoice["customer_email"]) {
        Some(email) => Some(email),
        None => match invoice["customer"].as_str() {
            Some(customer) => gateway.customer_email(customer).await?,
            None => None,
        },
    };
    credit_purchase(pool, gateway.prices(), email, invoice_price_id(invoice)).await
}

/// Applies a signed payment provider event.
pub async fn handle_webhook<G>(
    pool: &PgPool,
    gateway: &G,
    payload: &[u8],
    signature: Option<&str>,
) -> Result<WebhookResponse, ApplicationError<()>>
where
    G: PaymentGateway + ?Sized,
{
    let event = signature
        .ok_or_else(|| ServiceError::new(ServiceKind::Payment, "missing signature header"))
        .and_then(|signature| gateway.verify_event(payload, signature))
        .map_err(|err| {
            tracing::warn!("rejected webhook delivery: {}", err.message);
            ValidationError::from_resource(
                (),
                vec![ValidationFieldError::new(
                    "payment::signature",
                    signature.unwrap_or_default().to_owned(),
                    "/stripe-signature".into(),
                    vec![ValidationErrorKind::Invalid],
                )],
            )
        })?;

    let object = &event["data"]["object"];
    match event["type"].as_str().unwrap_or_default() {
        "checkout.session.completed" => checkout_completed(pool, gateway, object).await?,
        "invoice.paid" => invoice_paid(pool, gateway, object).await?,
        "invoice.payment_failed" => {
            tracing::warn!(
                customer = ?object["customer"],
                invoice = ?object["id"],
                "invoice payment failed"
            );
        }
        other => tracing::debug!(event = other, "ignored payment event"),
    }

    Ok(WebhookResponse { status: "success" })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn prices() -> PlanPrices {
        PlanPrices {
            premium: "price_premium".into(),
            ultra: "price_ultra".into(),
        }
    }

    #[test]
    fn plans_grant_their_period_credits() {
        assert_eq!(
            plan_credit(&prices(), Some("price_premium")),
            Some((Subscription::Premium, 25))
        );
        assert_eq!(
            plan_credit(&prices(), Some("price_ultra")),
            Some((Subscription::Ultra, 50))
        );
    }

    #[test]
    fn unknown_prices_grant_nothing() {
        assert_eq!(plan_credit(&prices(), Some("price_other")), None);
        assert_eq!(plan_credit(&prices(), None), None);

        let unset = PlanPrices {
            premium: String::new(),
            ultra: String::new(),
        };
        assert_eq!(plan_credit(&unset, Some("")), None);
    }

    #[test]
    fn only_paid_checkouts_are_credited() {
        assert!(is_paid(&json!({"payment_status": "paid"})));
        assert!(!is_paid(&json!({"payment_status": "unpaid"})));
        assert!(!is_paid(&json!({})));
    }

    #[test]
    fn first_subscription_invoice_is_skipped() {
        assert!(!is_renewal(&json!({"billing_reason": "subscription_create"})));
        assert!(is_renewal(&json!({"billing_reason": "subscription_cycle"})));
        assert!(is_renewal(&json!({})));
    }

    #[test]
    fn checkout_email_falls_back_to_customer_details() {
        let session = json!({"customer_email": "", "customer_details": {"email": "b@c.com"}});
        assert_eq!(checkout_email(&session).as_deref(), Some("b@c.com"));

        let session = json!({"customer_email": "a@c.com", "customer_details": {"email": "b@c.com"}});
        assert_eq!(checkout_email(&session).as_deref(), Some("a@c.com"));

        assert_eq!(checkout_email(&json!({})), None);
    }

    #[test]
    fn invoice_price_comes_from_the_first_line() {
        let invoice = json!({"lines": {"data": [{"price": {"id": "price_ultra"}}]}});
        assert_eq!(invoice_price_id(&invoice).as_deref(), Some("price_ultra"));
        assert_eq!(invoice_price_id(&json!({"lines": {"data": []}})), None);
    }
}
