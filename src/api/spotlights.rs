use axum::{extract::State, Json};
use chrono::{NaiveDate, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    api::error::ApiError,
    app::App,
    database::models::{company, spotlight},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotlightView {
    pub date: NaiveDate,
    pub position: i32,
    pub company_id: Uuid,
    pub company_name: Option<String>,
    pub blurb: String,
}

/// Today's featured companies in slot order.
pub async fn today(State(app): State<App>) -> Result<Json<Vec<SpotlightView>>, ApiError> {
    let today = Utc::now().date_naive();

    let rows = spotlight::Entity::find()
        .find_also_related(company::Entity)
        .filter(spotlight::Column::Date.eq(today))
        .order_by_asc(spotlight::Column::Position)
        .all(&app.db)
        .await?;

    let views = rows
        .into_iter()
        .map(|(slot, company)| SpotlightView {
            date: slot.date,
            position: slot.position,
            company_id: slot.company_id,
            company_name: company.map(|c| c.name),
            blurb: slot.blurb,
        })
        .collect();

    Ok(Json(views))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Value;

    use crate::tests::{fixtures, setup_test::setup_test};

    #[tokio::test]
    async fn test_lists_todays_slots_with_company_names() {
        let test = setup_test().await;
        let today = Utc::now().date_naive();
        let tea = fixtures::company(&test.db, "Nairobi Tea", true, 4.1, true).await;
        let cocoa = fixtures::company(&test.db, "Accra Cocoa", true, 4.6, true).await;
        fixtures::spotlight(&test.db, today, 2, tea.id).await;
        fixtures::spotlight(&test.db, today, 1, cocoa.id).await;
        fixtures::spotlight(&test.db, today - chrono::Duration::days(1), 1, tea.id).await;

        let response = test.server.get("/api/spotlights/today").await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        let slots = body.as_array().unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0]["companyName"], "Accra Cocoa");
        assert_eq!(slots[0]["position"], 1);
        assert_eq!(slots[1]["companyName"], "Nairobi Tea");
    }
}
