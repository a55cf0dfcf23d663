use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::draft::{Draft, DraftKind};

pub const SIDE_PANEL_MIN: i32 = 180;
pub const SIDE_PANEL_MAX: i32 = 600;
pub const CENTER_PANEL_MIN: i32 = 250;
pub const CENTER_PANEL_FLOOR_MAX: i32 = 600;
const SIDE_PANELS_RESERVED: i32 = 360;

/// Fits a `[left, center, right]` layout into a viewport. The center pane absorbs any overflow,
/// and on screens narrower than both side minimums the side panes give way too.
pub fn clamp_layout(sizes: [i32; 3], viewport_width: i32) -> [i32; 3] {
    let width = viewport_width.max(0);
    let [left, center, right] = sizes;
    let mut left = left.clamp(SIDE_PANEL_MIN, SIDE_PANEL_MAX);
    let mut right = right.clamp(SIDE_PANEL_MIN, SIDE_PANEL_MAX);
    let center_max = CENTER_PANEL_FLOOR_MAX.max(width.saturating_sub(SIDE_PANELS_RESERVED));
    let mut center = center.clamp(CENTER_PANEL_MIN, center_max);
    if i64::from(left) + i64::from(center) + i64::from(right) > i64::from(width) {
        center = (width - left - right).max(0);
    }
    if left + right > width {
        left = width / 2;
        right = width - left;
    }
    [left, center, right]
}

/// Editor state mirrored from the browser. Fields not relevant to a kind stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, validator::Validate)]
pub struct DraftPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_left: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_sizes: Option<[i32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = 100_000, message = "viewport_width must be between 0 and 100000"))]
    pub viewport_width: Option<i32>,
    /// Set once a read has reported the expiry of the current save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_reported: Option<bool>,
}

impl DraftPayload {
    pub fn normalized(mut self) -> Self {
        self.time_left = self.time_left.map(|t| t.max(0));
        self.expired_reported = None;
        if let (Some(sizes), Some(width)) = (self.panel_sizes, self.viewport_width) {
            self.panel_sizes = Some(clamp_layout(sizes, width));
        }
        self
    }

    /// The countdown has run out and the submit dialog is due.
    pub fn is_expired(&self) -> bool {
        self.time_left == Some(0)
    }

    /// Reports an expiry at most once per save. Returns whether this call reported it.
    pub fn take_expiry(&mut self) -> bool {
        if !self.is_expired() || self.expired_reported == Some(true) {
            return false;
        }
        self.expired_reported = Some(true);
        true
    }
}

#[derive(Clone)]
pub struct DraftService {
    pool: PgPool,
}

impl DraftService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads a draft and consumes a pending expiry report. The flag is true only on the first
    /// read after a save that ran the countdown out.
    pub async fn read(&self, user_id: Uuid, problem_id: Uuid, kind: DraftKind) -> Result<Option<(Draft, bool)>> {
        let mut tx = self.pool.begin().await?;
        let draft = sqlx::query_as::<_, Draft>(
            r#"SELECT user_id, problem_id, kind, payload, updated_at
               FROM practice_drafts
               WHERE user_id = $1 AND problem_id = $2 AND kind = $3
               FOR UPDATE"#,
        )
        .bind(user_id)
        .bind(problem_id)
        .bind(kind.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut draft) = draft else {
            tx.commit().await?;
            return Ok(None);
        };

        let mut payload: DraftPayload = serde_json::from_value(draft.payload.clone())?;
        let expired = payload.take_expiry();
        if expired {
            draft.payload = serde_json::to_value(&payload)?;
            sqlx::query(
                "UPDATE practice_drafts SET payload = $4 WHERE user_id = $1 AND problem_id = $2 AND kind = $3",
            )
            .bind(user_id)
            .bind(problem_id)
            .bind(kind.as_str())
            .bind(&draft.payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(Some((draft, expired)))
    }

    /// Last write wins.
    pub async fn save(
        &self,
        user_id: Uuid,
        problem_id: Uuid,
        kind: DraftKind,
        payload: DraftPayload,
    ) -> Result<Draft> {
        self.ensure_problem(problem_id).await?;
        let payload = serde_json::to_value(payload.normalized())?;
        let draft = sqlx::query_as::<_, Draft>(
            r#"INSERT INTO practice_drafts (user_id, problem_id, kind, payload, updated_at)
               VALUES ($1, $2, $3, $4, NOW())
               ON CONFLICT (user_id, problem_id, kind)
               DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()
               RETURNING user_id, problem_id, kind, payload, updated_at"#,
        )
        .bind(user_id)
        .bind(problem_id)
        .bind(kind.as_str())
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(draft)
    }

    pub async fn delete(&self, user_id: Uuid, problem_id: Uuid, kind: DraftKind) -> Result<()> {
        sqlx::query("DELETE FROM practice_drafts WHERE user_id = $1 AND problem_id = $2 AND kind = $3")
            .bind(user_id)
            .bind(problem_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drops every draft for the problem and the active pointer if it targets it.
    pub async fn clear_after_submit<'e, E>(executor: E, user_id: Uuid, problem_id: Uuid) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"WITH dropped AS (
                   DELETE FROM practice_drafts WHERE user_id = $1 AND problem_id = $2
               )
               DELETE FROM active_problems WHERE user_id = $1 AND problem_id = $2"#,
        )
        .bind(user_id)
        .bind(problem_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn get_active(&self, user_id: Uuid) -> Result<Option<Uuid>> {
        let active: Option<Uuid> =
            sqlx::query_scalar("SELECT problem_id FROM active_problems WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(active)
    }

    pub async fn set_active(&self, user_id: Uuid, problem_id: Uuid) -> Result<()> {
        self.ensure_problem(problem_id).await?;
        sqlx::query(
            r#"INSERT INTO active_problems (user_id, problem_id, updated_at)
               VALUES ($1, $2, NOW())
               ON CONFLICT (user_id) DO UPDATE SET problem_id = EXCLUDED.problem_id, updated_at = NOW()"#,
        )
        .bind(user_id)
        .bind(problem_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_active(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM active_problems WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ensure_problem(&self, problem_id: Uuid) -> Result<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM practice_problems WHERE id = $1)")
                .bind(problem_id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(Error::NotFound("Practice problem not found".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn layout_within_bounds_is_untouched() {
        assert_eq!(clamp_layout([300, 700, 300], 1400), [300, 700, 300]);
    }

    #[test]
    fn side_panels_are_clamped() {
        assert_eq!(clamp_layout([50, 700, 900], 2000), [180, 700, 600]);
    }

    #[test]
    fn center_max_tracks_viewport() {
        // Capped at W - 360, then trimmed to fit.
        assert_eq!(clamp_layout([200, 3000, 200], 2000), [200, 1600, 200]);
        // Narrow screens still allow up to 600 before overflow handling.
        assert_eq!(clamp_layout([180, 900, 180], 900), [180, 540, 180]);
    }

    #[test]
    fn center_absorbs_overflow() {
        let [l, c, r] = clamp_layout([600, 800, 600], 1600);
        assert_eq!(l + c + r, 1600);
        assert_eq!(c, 400);
    }

    #[test]
    fn narrow_viewport_never_overflows() {
        let sizes = clamp_layout([180, 250, 180], 300);
        assert_eq!(sizes, [150, 0, 150]);
        assert!(sizes.iter().sum::<i32>() <= 300);

        for width in [0, 1, 359, 360, 361, 609, 610, 611] {
            let sizes = clamp_layout([600, 5000, 600], width);
            assert!(sizes.iter().sum::<i32>() <= width, "width {}", width);
            assert!(sizes.iter().all(|s| *s >= 0), "width {}", width);
        }
    }

    #[test]
    fn huge_viewport_keeps_requested_center() {
        assert_eq!(clamp_layout([200, 5000, 200], i32::MAX), [200, 5000, 200]);
    }

    #[test]
    fn negative_viewport_collapses_to_zero() {
        assert_eq!(clamp_layout([200, 300, 200], i32::MIN), [0, 0, 0]);
        assert_eq!(clamp_layout([200, 300, 200], -50), [0, 0, 0]);
    }

    #[test]
    fn viewport_width_is_range_checked() {
        let payload = DraftPayload {
            panel_sizes: Some([200, 300, 200]),
            viewport_width: Some(i32::MIN),
            ..Default::default()
        };
        assert!(payload.validate().is_err());
        assert_eq!(payload.normalized().panel_sizes, Some([0, 0, 0]));

        let ok = DraftPayload {
            viewport_width: Some(1280),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn expiry_is_reported_once_per_save() {
        let mut stored = DraftPayload {
            code: Some("x".into()),
            time_left: Some(0),
            ..Default::default()
        }
        .normalized();
        assert!(stored.take_expiry());
        assert!(!stored.take_expiry());
        assert_eq!(stored.expired_reported, Some(true));

        // A new save resets the marker.
        let mut resaved = stored.normalized();
        assert!(resaved.take_expiry());
    }

    #[test]
    fn running_countdown_never_reports_expiry() {
        let mut stored = DraftPayload {
            time_left: Some(30),
            ..Default::default()
        };
        assert!(!stored.take_expiry());
        assert_eq!(stored.expired_reported, None);
    }

    #[test]
    fn normalized_clamps_time_left() {
        let payload = DraftPayload {
            code: Some("print(1)".into()),
            time_left: Some(-5),
            ..Default::default()
        }
        .normalized();
        assert_eq!(payload.time_left, Some(0));
        assert!(payload.is_expired());
    }

    #[test]
    fn payload_round_trips_client_fields() {
        let raw = serde_json::json!({"code": "fn main() {}", "selected_language": "rust", "time_left": 1200});
        let payload: DraftPayload = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(payload.normalized()).unwrap(), raw);
    }
}
