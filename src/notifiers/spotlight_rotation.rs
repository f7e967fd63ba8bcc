use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    app::App,
    copywriter::template_blurb,
    database::models::{company, spotlight},
    jobs::{Job, JobError},
};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SpotlightRotationArguments {
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SpotlightRotationReport {
    pub date: NaiveDate,
    /// Today's slots were already filled
    pub skipped: bool,
    pub featured: Vec<Uuid>,
    /// Blurbs that came from the template because the copywriter failed
    pub fallbacks: usize,
}

pub struct SpotlightRotationJob;

impl Job for SpotlightRotationJob {
    type Arguments = SpotlightRotationArguments;
    type Report = SpotlightRotationReport;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<Self::Report, JobError> {
        let today = arguments.as_of.unwrap_or_else(Utc::now).date_naive();
        Ok(rotate_spotlight(app, today).await?)
    }

    fn name() -> &'static str {
        "spotlight_rotation"
    }
}

/// Picks up to `slots` companies, skipping recently featured ones unless
/// that leaves too few to fill the day.
pub fn choose_companies(
    candidates: Vec<company::Model>,
    recently_featured: &HashSet<Uuid>,
    slots: usize,
) -> Vec<company::Model> {
    let fresh = candidates
        .iter()
        .filter(|company| !recently_featured.contains(&company.id))
        .count();

    if fresh < slots {
        return candidates.into_iter().take(slots).collect();
    }

    candidates
        .into_iter()
        .filter(|company| !recently_featured.contains(&company.id))
        .take(slots)
        .collect()
}

pub async fn rotate_spotlight(
    app: &App,
    today: NaiveDate,
) -> Result<SpotlightRotationReport, DbErr> {
    let settings = &app.config.spotlight;
    let slots = settings.slots as usize;

    let existing = spotlight::Entity::find()
        .filter(spotlight::Column::Date.eq(today))
        .count(&app.db)
        .await?;

    if existing >= u64::from(settings.slots) {
        debug!("🔦 Spotlight for {} already set", today);
        return Ok(SpotlightRotationReport {
            date: today,
            skipped: true,
            featured: Vec::new(),
            fallbacks: 0,
        });
    }

    let candidates = company::Entity::find()
        .filter(company::Column::IsActive.eq(true))
        .order_by_desc(company::Column::IsVerified)
        .order_by_desc(company::Column::Rating)
        .order_by_desc(company::Column::TrustScore)
        .order_by_asc(company::Column::Name)
        .limit(settings.candidate_pool)
        .all(&app.db)
        .await?;

    let lookback_start = today - chrono::Duration::days(settings.lookback_days);
    let recently_featured: HashSet<Uuid> = spotlight::Entity::find()
        .filter(spotlight::Column::Date.gte(lookback_start))
        .filter(spotlight::Column::Date.lt(today))
        .all(&app.db)
        .await?
        .into_iter()
        .map(|row| row.company_id)
        .collect();

    let chosen = choose_companies(candidates, &recently_featured, slots);
    let now = Utc::now().naive_utc();
    let mut report = SpotlightRotationReport {
        date: today,
        skipped: false,
        featured: Vec::with_capacity(chosen.len()),
        fallbacks: 0,
    };

    for (position, company) in (1..).zip(chosen) {
        let blurb = match app.copywriter.blurb(&company).await {
            Ok(blurb) => blurb,
            Err(e) => {
                warn!("🔦 Copywriter failed for company {}, using template: {}", company.id, e);
                report.fallbacks += 1;
                template_blurb(&company)
            }
        };

        let row = spotlight::ActiveModel {
            id: Set(Uuid::new_v4()),
            date: Set(today),
            position: Set(position),
            company_id: Set(company.id),
            blurb: Set(blurb),
            created_at: Set(now),
        };

        spotlight::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([spotlight::Column::Date, spotlight::Column::Position])
                    .update_columns([spotlight::Column::CompanyId, spotlight::Column::Blurb])
                    .to_owned(),
            )
            .exec_without_returning(&app.db)
            .await?;

        report.featured.push(company.id);
    }

    if report.featured.len() < slots {
        warn!(
            "🔦 Only {} active companies available for {} spotlight slots",
            report.featured.len(),
            slots
        );
    }

    info!(
        "🔦 Spotlight for {}: {} companies featured ({} template blurbs)",
        today,
        report.featured.len(),
        report.fallbacks
    );

    Ok(report)
}
