use async_trait::async_trait;
use sqlx::FromRow;
use time::{Date, Time};

use crate::application::repos::{MissionSourceRepo, RepoError};
use crate::domain::mission::MissionSource;
use crate::domain::subjects::SubjectKey;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct MissionRow {
    full_name: String,
    email: Option<String>,
    role: String,
    competition: String,
    home_team: String,
    away_team: String,
    venue: String,
    city: String,
    match_date: Date,
    kickoff_time: Time,
}

#[async_trait]
impl MissionSourceRepo for PostgresRepositories {
    async fn fetch_mission(
        &self,
        subject: &SubjectKey,
    ) -> Result<Option<MissionSource>, RepoError> {
        // Subject keys are lower-cased; the dashboard's ids may not be.
        let row = sqlx::query_as::<_, MissionRow>(
            r#"
            SELECT o.full_name, o.email, mo.role,
                   m.competition, m.home_team, m.away_team, m.venue, m.city,
                   m.match_date, m.kickoff_time
            FROM match_officials mo
            JOIN matches m ON m.id = mo.match_id
            JOIN officials o ON o.id = mo.official_id
            WHERE lower(mo.match_id) = $1 AND lower(mo.official_id) = $2
            LIMIT 1
            "#,
        )
        .bind(subject.match_id())
        .bind(subject.official_id())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| MissionSource {
            subject: subject.clone(),
            official_name: row.full_name,
            official_email: row.email,
            role: row.role,
            competition: row.competition,
            home_team: row.home_team,
            away_team: row.away_team,
            venue: row.venue,
            city: row.city,
            match_date: row.match_date,
            kickoff_time: row.kickoff_time,
        }))
    }
}
