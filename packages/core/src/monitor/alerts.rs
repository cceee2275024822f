//! Alert set with coalescing, hysteresis, and garbage collection.
//!
//! One unresolved [`Alert`] exists per condition id. Re-triggering an
//! unresolved id merges metadata and bumps `updated_at` instead of
//! duplicating. The auto-resolve sweep only touches alerts older than the
//! grace period, so a transient spike does not clear instantly and a
//! persistent condition is not re-alerted repeatedly.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::monitor::types::{Alert, AlertRule, AlertSeverity};

pub struct AlertManager {
    alerts: HashMap<String, Alert>,
    /// Minimum age before an unresolved alert may auto-resolve.
    grace: Duration,
    /// How long resolved alerts are kept before collection.
    retention: Duration,
}

impl AlertManager {
    pub fn new(grace_secs: i64, retention_secs: i64) -> Self {
        Self {
            alerts: HashMap::new(),
            grace: Duration::seconds(grace_secs),
            retention: Duration::seconds(retention_secs),
        }
    }

    /// Raise or refresh the alert for `id`.
    ///
    /// If an unresolved alert already exists the repeated breach coalesces
    /// into it: message and metadata are replaced, `updated_at` is bumped,
    /// `created_at` is untouched. Otherwise a new unresolved alert is
    /// inserted and logged at a level matching its severity.
    pub fn create_or_update(
        &mut self,
        id: &str,
        severity: AlertSeverity,
        message: String,
        metadata: Value,
        rule: Option<AlertRule>,
    ) {
        let now = Utc::now();

        if let Some(existing) = self.alerts.get_mut(id) {
            if !existing.resolved {
                existing.severity = severity;
                existing.message = message;
                existing.metadata = metadata;
                existing.updated_at = now;
                tracing::debug!("Alert '{}' re-triggered, coalesced", id);
                return;
            }
        }

        match severity {
            AlertSeverity::Warning => tracing::warn!("Alert raised [{}]: {}", id, message),
            AlertSeverity::Error | AlertSeverity::Critical => {
                tracing::error!("Alert raised [{}]: {}", id, message)
            }
        }

        self.alerts.insert(
            id.to_string(),
            Alert {
                id: id.to_string(),
                severity,
                message,
                metadata,
                created_at: now,
                updated_at: now,
                resolved: false,
                resolved_at: None,
                rule,
            },
        );
    }

    /// Mark the alert resolved. Idempotent — returns `false` when the id is
    /// unknown or already resolved.
    pub fn resolve(&mut self, id: &str) -> bool {
        match self.alerts.get_mut(id) {
            Some(alert) if !alert.resolved => {
                alert.resolved = true;
                alert.resolved_at = Some(Utc::now());
                tracing::info!("Alert resolved [{}]", id);
                true
            }
            _ => false,
        }
    }

    /// Auto-resolve every unresolved rule-backed alert older than the grace
    /// period whose condition no longer holds. Returns how many resolved.
    ///
    /// Alerts without a rule (job failures) are never auto-resolved.
    pub fn auto_resolve(
        &mut self,
        now: DateTime<Utc>,
        condition_holds: impl Fn(&AlertRule) -> bool,
    ) -> usize {
        let grace = self.grace;
        let mut resolved = 0;

        for alert in self.alerts.values_mut() {
            if alert.resolved {
                continue;
            }
            let Some(rule) = alert.rule else { continue };
            if now - alert.created_at < grace {
                continue;
            }
            if !condition_holds(&rule) {
                alert.resolved = true;
                alert.resolved_at = Some(now);
                resolved += 1;
                tracing::info!("Alert auto-resolved [{}]", alert.id);
            }
        }

        resolved
    }

    /// Drop resolved alerts past the retention window.
    pub fn gc(&mut self, now: DateTime<Utc>) {
        let retention = self.retention;
        self.alerts.retain(|_, alert| match alert.resolved_at {
            Some(resolved_at) => now - resolved_at < retention,
            None => true,
        });
    }

    /// Unresolved alerts, most recently updated first.
    pub fn active(&self) -> Vec<Alert> {
        let mut active: Vec<Alert> = self
            .alerts
            .values()
            .filter(|alert| !alert.resolved)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        active
    }

    /// Every alert, resolved included, most recently updated first.
    pub fn all(&self) -> Vec<Alert> {
        let mut all: Vec<Alert> = self.alerts.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.get(id)
    }

    pub fn has_unresolved_critical(&self) -> bool {
        self.alerts
            .values()
            .any(|alert| !alert.resolved && alert.severity == AlertSeverity::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_manager() -> AlertManager {
        AlertManager::new(600, 86_400)
    }

    fn raise(manager: &mut AlertManager, id: &str, message: &str) {
        manager.create_or_update(
            id,
            AlertSeverity::Warning,
            message.to_string(),
            json!({}),
            Some(AlertRule::HighCpu),
        );
    }

    #[test]
    fn repeated_breaches_coalesce_into_one_alert() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 85%");
        let first_created = manager.get("high-cpu-usage").unwrap().created_at;

        for pct in [88, 92, 95] {
            raise(&mut manager, "high-cpu-usage", &format!("CPU at {}%", pct));
        }

        let active = manager.active();
        assert_eq!(active.len(), 1);
        let alert = &active[0];
        assert_eq!(alert.message, "CPU at 95%");
        assert_eq!(alert.created_at, first_created);
        assert!(alert.updated_at >= first_created);
    }

    #[test]
    fn distinct_ids_surface_separately() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 90%");
        raise(&mut manager, "high-memory-usage", "Memory at 92%");

        assert_eq!(manager.active().len(), 2);
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 90%");

        assert!(manager.resolve("high-cpu-usage"));
        assert!(!manager.resolve("high-cpu-usage"));
        assert!(!manager.resolve("no-such-alert"));
        assert!(manager.active().is_empty());
    }

    #[test]
    fn re_trigger_after_resolution_opens_a_fresh_alert() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 90%");
        manager.resolve("high-cpu-usage");

        raise(&mut manager, "high-cpu-usage", "CPU at 91%");

        let active = manager.active();
        assert_eq!(active.len(), 1);
        assert!(!active[0].resolved);
    }

    #[test]
    fn auto_resolve_skips_alerts_younger_than_grace() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 90%");

        // Condition cleared, but the alert is brand new.
        let resolved = manager.auto_resolve(Utc::now(), |_| false);

        assert_eq!(resolved, 0);
        assert_eq!(manager.active().len(), 1);
    }

    #[test]
    fn auto_resolve_clears_aged_alerts_whose_condition_no_longer_holds() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 90%");

        // Evaluate from a vantage point past the grace period.
        let later = Utc::now() + Duration::seconds(700);
        let resolved = manager.auto_resolve(later, |_| false);

        assert_eq!(resolved, 1);
        assert!(manager.active().is_empty());
        assert!(!manager.resolve("high-cpu-usage")); // second resolve is a no-op
    }

    #[test]
    fn auto_resolve_keeps_alerts_whose_condition_still_holds() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 90%");

        let later = Utc::now() + Duration::seconds(700);
        let resolved = manager.auto_resolve(later, |_| true);

        assert_eq!(resolved, 0);
        assert_eq!(manager.active().len(), 1);
    }

    #[test]
    fn auto_resolve_never_touches_rule_less_alerts() {
        let mut manager = make_manager();
        manager.create_or_update(
            "error-trendingRefresh",
            AlertSeverity::Error,
            "job failed".to_string(),
            json!({}),
            None,
        );

        let later = Utc::now() + Duration::seconds(700);
        assert_eq!(manager.auto_resolve(later, |_| false), 0);
        assert_eq!(manager.active().len(), 1);
    }

    #[test]
    fn gc_drops_resolved_alerts_past_retention() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 90%");
        manager.resolve("high-cpu-usage");

        manager.gc(Utc::now() + Duration::days(2));

        assert!(manager.get("high-cpu-usage").is_none());
    }

    #[test]
    fn gc_keeps_unresolved_alerts() {
        let mut manager = make_manager();
        raise(&mut manager, "high-cpu-usage", "CPU at 90%");

        manager.gc(Utc::now() + Duration::days(30));

        assert!(manager.get("high-cpu-usage").is_some());
    }

    #[test]
    fn has_unresolved_critical_tracks_severity() {
        let mut manager = make_manager();
        assert!(!manager.has_unresolved_critical());

        manager.create_or_update(
            "high-cpu-usage",
            AlertSeverity::Critical,
            "CPU pegged".to_string(),
            json!({}),
            Some(AlertRule::HighCpu),
        );
        assert!(manager.has_unresolved_critical());

        manager.resolve("high-cpu-usage");
        assert!(!manager.has_unresolved_critical());
    }
}
