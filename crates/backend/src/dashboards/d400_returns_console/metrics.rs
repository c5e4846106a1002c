//! Агрегация метрик по выборке возвратов.
//!
//! Чистые функции без I/O: один проход по коллекции, результат зависит
//! только от записей и момента вычисления.

use chrono::{DateTime, Utc};
use contracts::dashboards::d400_returns_console::{
    FinancialMetrics, MetricsSnapshot, RateMetrics, TimeMetrics, TrendDelta, TrendDirection,
};
use contracts::domain::a001_marketplace_return::{ReturnPriority, ReturnRecord};
use std::collections::BTreeMap;

/// Ключ распределения для отсутствующего статуса или типа
pub const UNKNOWN_BUCKET: &str = "unknown";

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Среднее по записям, где значение есть и не равно нулю
#[derive(Default)]
struct NonZeroMean {
    sum: f64,
    count: usize,
}

impl NonZeroMean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| *v != 0.0 && v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            round2(self.sum / self.count as f64)
        }
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(count as f64 / total as f64 * 100.0)
    }
}

fn bucket(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_BUCKET)
        .to_string()
}

/// Снимок метрик на момент `now`
pub fn compute_metrics(records: &[ReturnRecord], now: DateTime<Utc>) -> MetricsSnapshot {
    let total = records.len();

    let mut priority_distribution = BTreeMap::new();
    let mut status_distribution = BTreeMap::new();
    let mut type_distribution = BTreeMap::new();

    let mut response = NonZeroMean::default();
    let mut resolution = NonZeroMean::default();
    let mut satisfaction = NonZeroMean::default();

    let mut escalated = 0usize;
    let mut mediated = 0usize;
    let mut high_priority = 0usize;
    let mut unread: i64 = 0;
    let mut overdue = 0usize;

    let mut retained = 0.0;
    let mut shipping = 0.0;
    let mut compensation = 0.0;

    for record in records {
        // Без приоритета запись считается средней
        let priority = record.priority.unwrap_or(ReturnPriority::Medium);
        *priority_distribution
            .entry(priority.code().to_string())
            .or_insert(0) += 1;
        *status_distribution
            .entry(bucket(record.status.map(|s| s.code())))
            .or_insert(0) += 1;
        *type_distribution
            .entry(bucket(record.claim_type.as_deref()))
            .or_insert(0) += 1;

        response.push(record.avg_response_time);
        resolution.push(record.total_resolution_time);
        satisfaction.push(record.satisfaction);

        if record.escalated_to_marketplace {
            escalated += 1;
        }
        if record.in_mediation {
            mediated += 1;
        }
        if record.priority.map(|p| p.is_high()).unwrap_or(false) {
            high_priority += 1;
        }
        unread += i64::from(record.unread_messages.unwrap_or(0));
        if record.is_overdue_at(now) {
            overdue += 1;
        }

        retained += record.retained_value.unwrap_or(0.0);
        shipping += record.shipping_cost.unwrap_or(0.0);
        compensation += record.compensation_value.unwrap_or(0.0);
    }

    MetricsSnapshot {
        total_count: total,
        priority_distribution,
        status_distribution,
        type_distribution,
        time: TimeMetrics {
            avg_response_time: response.value(),
            avg_resolution_time: resolution.value(),
            avg_satisfaction: satisfaction.value(),
        },
        rates: RateMetrics {
            escalation_rate: rate(escalated, total),
            mediation_rate: rate(mediated, total),
        },
        high_priority_count: high_priority,
        unread_messages_count: unread,
        overdue_actions_count: overdue,
        financial: {
            let retained_value_sum = round2(retained);
            let shipping_cost_sum = round2(shipping);
            let compensation_value_sum = round2(compensation);
            // Итог равен сумме округленных слагаемых
            FinancialMetrics {
                retained_value_sum,
                shipping_cost_sum,
                compensation_value_sum,
                net_impact: round2(retained_value_sum + shipping_cost_sum + compensation_value_sum),
            }
        },
        evaluated_at: Some(now),
    }
}

fn delta(metric: &str, current: f64, previous: f64) -> TrendDelta {
    let delta_percent = if previous == 0.0 {
        None
    } else {
        Some(round2((current - previous).abs() / previous.abs() * 100.0))
    };
    let direction = if current > previous {
        TrendDirection::Up
    } else if current < previous {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };
    TrendDelta {
        metric: metric.to_string(),
        current,
        previous,
        delta_percent,
        direction,
    }
}

/// Сравнение с предыдущим снимком по уже округленным значениям
pub fn compare(current: &MetricsSnapshot, previous: &MetricsSnapshot) -> Vec<TrendDelta> {
    vec![
        delta(
            "total_count",
            current.total_count as f64,
            previous.total_count as f64,
        ),
        delta(
            "high_priority_count",
            current.high_priority_count as f64,
            previous.high_priority_count as f64,
        ),
        delta(
            "unread_messages_count",
            current.unread_messages_count as f64,
            previous.unread_messages_count as f64,
        ),
        delta(
            "overdue_actions_count",
            current.overdue_actions_count as f64,
            previous.overdue_actions_count as f64,
        ),
        delta(
            "avg_response_time",
            current.time.avg_response_time,
            previous.time.avg_response_time,
        ),
        delta(
            "avg_resolution_time",
            current.time.avg_resolution_time,
            previous.time.avg_resolution_time,
        ),
        delta(
            "avg_satisfaction",
            current.time.avg_satisfaction,
            previous.time.avg_satisfaction,
        ),
        delta(
            "escalation_rate",
            current.rates.escalation_rate,
            previous.rates.escalation_rate,
        ),
        delta(
            "mediation_rate",
            current.rates.mediation_rate,
            previous.rates.mediation_rate,
        ),
        delta(
            "net_impact",
            current.financial.net_impact,
            previous.financial.net_impact,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use contracts::domain::a001_marketplace_return::ReturnStatus;

    fn record(id: &str) -> ReturnRecord {
        ReturnRecord::new(id, "acc-1", Utc::now())
    }

    #[test]
    fn test_empty_collection() {
        let snapshot = compute_metrics(&[], Utc::now());
        assert_eq!(snapshot.total_count, 0);
        assert_eq!(snapshot.rates.escalation_rate, 0.0);
        assert_eq!(snapshot.rates.mediation_rate, 0.0);
        assert_eq!(snapshot.time.avg_response_time, 0.0);
        assert!(snapshot.priority_distribution.is_empty());
    }

    #[test]
    fn test_counts_and_distributions() {
        let now = Utc::now();
        let mut a = record("a");
        a.priority = Some(ReturnPriority::Critical);
        a.status = Some(ReturnStatus::Opened);
        a.claim_type = Some("return".into());
        a.unread_messages = Some(4);
        let mut b = record("b");
        b.priority = Some(ReturnPriority::High);
        b.unread_messages = Some(1);
        let mut c = record("c");
        c.status = Some(ReturnStatus::Closed);
        c.claim_type = Some("claim".into());

        let snapshot = compute_metrics(&[a, b, c], now);
        assert_eq!(snapshot.total_count, 3);
        assert_eq!(snapshot.high_priority_count, 2);
        assert!(snapshot.high_priority_count <= snapshot.total_count);
        assert_eq!(snapshot.unread_messages_count, 5);
        assert_eq!(snapshot.priority_distribution.get("medium"), Some(&1));
        assert_eq!(snapshot.priority_distribution.get("critical"), Some(&1));
        assert_eq!(snapshot.status_distribution.get(UNKNOWN_BUCKET), Some(&1));
        assert_eq!(snapshot.type_distribution.get(UNKNOWN_BUCKET), Some(&1));
        let sum: usize = snapshot.status_distribution.values().sum();
        assert_eq!(sum, snapshot.total_count);
        assert_eq!(snapshot.evaluated_at, Some(now));
    }

    #[test]
    fn test_averages_exclude_null_and_zero() {
        let mut a = record("a");
        a.avg_response_time = Some(30.0);
        a.satisfaction = Some(0.8);
        let mut b = record("b");
        b.avg_response_time = Some(0.0);
        b.satisfaction = Some(0.5);
        let mut c = record("c");
        c.avg_response_time = None;
        c.total_resolution_time = Some(100.0);
        let mut d = record("d");
        d.avg_response_time = Some(15.0);
        d.total_resolution_time = Some(51.0);

        let snapshot = compute_metrics(&[a, b, c, d], Utc::now());
        assert_eq!(snapshot.time.avg_response_time, 22.5);
        assert_eq!(snapshot.time.avg_resolution_time, 75.5);
        assert_eq!(snapshot.time.avg_satisfaction, 0.65);
    }

    #[test]
    fn test_rates_are_rounded_percentages() {
        let mut a = record("a");
        a.escalated_to_marketplace = true;
        let b = record("b");
        let mut c = record("c");
        c.in_mediation = true;
        c.escalated_to_marketplace = true;

        let snapshot = compute_metrics(&[a, b, c], Utc::now());
        assert_eq!(snapshot.rates.escalation_rate, 66.67);
        assert_eq!(snapshot.rates.mediation_rate, 33.33);
    }

    #[test]
    fn test_overdue_depends_on_evaluation_instant() {
        let now = Utc::now();
        let mut a = record("a");
        a.action_due_at = Some(now + Duration::hours(1));
        let mut b = record("b");
        b.action_due_at = Some(now - Duration::hours(1));
        let records = vec![a, b, record("c")];

        assert_eq!(compute_metrics(&records, now).overdue_actions_count, 1);
        assert_eq!(
            compute_metrics(&records, now + Duration::hours(2)).overdue_actions_count,
            2
        );
    }

    #[test]
    fn test_net_impact_keeps_upstream_signs() {
        let mut a = record("a");
        a.retained_value = Some(-100.0);
        a.shipping_cost = Some(-12.5);
        let mut b = record("b");
        b.compensation_value = Some(40.25);

        let snapshot = compute_metrics(&[a, b], Utc::now());
        assert_eq!(snapshot.financial.retained_value_sum, -100.0);
        assert_eq!(snapshot.financial.net_impact, -72.25);
    }

    #[test]
    fn test_net_impact_equals_sum_of_rounded_components() {
        let mut a = record("a");
        a.retained_value = Some(1.004);
        a.shipping_cost = Some(1.004);
        a.compensation_value = Some(1.004);

        let financial = compute_metrics(&[a], Utc::now()).financial;
        assert_eq!(financial.retained_value_sum, 1.0);
        assert_eq!(financial.net_impact, 3.0);
        assert_eq!(
            financial.net_impact,
            round2(
                financial.retained_value_sum
                    + financial.shipping_cost_sum
                    + financial.compensation_value_sum
            )
        );
    }

    #[test]
    fn test_compare_trends() {
        let mut previous = MetricsSnapshot::default();
        previous.total_count = 4;
        previous.financial.net_impact = -200.0;
        let mut current = MetricsSnapshot::default();
        current.total_count = 5;
        current.financial.net_impact = -150.0;
        current.rates.escalation_rate = 10.0;

        let trends = compare(&current, &previous);
        let total = trends.iter().find(|t| t.metric == "total_count").unwrap();
        assert_eq!(total.delta_percent, Some(25.0));
        assert_eq!(total.direction, TrendDirection::Up);

        let net = trends.iter().find(|t| t.metric == "net_impact").unwrap();
        assert_eq!(net.delta_percent, Some(25.0));
        assert_eq!(net.direction, TrendDirection::Up);

        let escalation = trends.iter().find(|t| t.metric == "escalation_rate").unwrap();
        assert_eq!(escalation.delta_percent, None);

        let overdue = trends
            .iter()
            .find(|t| t.metric == "overdue_actions_count")
            .unwrap();
        assert_eq!(overdue.direction, TrendDirection::Flat);
    }
}
