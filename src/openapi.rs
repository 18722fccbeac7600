use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::eligibility::{Eligibility, EligibilityReason};
use crate::handlers::ReservationResult;
use crate::models::ScheduledClass;
use crate::presentation::{ClassView, DaySchedule, MembershipCard, TypeBalance, WeekSchedule};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let Some(components) = openapi.components.as_mut() else {
            return;
        };
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::get_schedule,
        crate::handlers::get_membership,
        crate::handlers::reserve_class,
        crate::handlers::cancel_reservation,
        crate::handlers::get_ical
    ),
    components(schemas(
        ScheduledClass,
        Eligibility,
        EligibilityReason,
        ClassView,
        DaySchedule,
        TypeBalance,
        MembershipCard,
        WeekSchedule,
        ReservationResult
    )),
    tags(
        (name = "booking", description = "Class booking against a student's membership")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;
