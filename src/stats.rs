use crate::models::{Order, StoreData};
use crate::status::OrderStatus;
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
struct DayTotals {
    orders: u64,
    cancelled: u64,
    revenue_cents: u64,
}

#[derive(Debug, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub orders: u64,
    pub cancelled: u64,
    pub revenue_cents: u64,
}

#[derive(Debug, Serialize)]
pub struct WeeklyPoint {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub orders: u64,
    pub revenue_cents: u64,
}

#[derive(Debug, Serialize)]
pub struct WeeklyAveragePoint {
    pub week: String,
    pub days_counted: u8,
    pub avg_orders: f64,
    pub avg_revenue_cents: f64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub last_7_days: Vec<DailyPoint>,
    pub weekly_totals: Vec<WeeklyPoint>,
    pub weekly_averages: Vec<WeeklyAveragePoint>,
}

pub fn build_stats(data: &StoreData) -> StatsResponse {
    build_stats_at(Local::now().date_naive(), data)
}

/// Unpaid card orders never count; cancellations are tracked but earn nothing.
fn tally<'a>(orders: impl Iterator<Item = &'a Order>) -> BTreeMap<NaiveDate, DayTotals> {
    let mut days: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    for order in orders {
        let date = order.created_at.with_timezone(&Local).date_naive();
        let totals = days.entry(date).or_default();
        match order.status {
            OrderStatus::PendingPayment | OrderStatus::Failed => {}
            OrderStatus::Cancelled => totals.cancelled += 1,
            _ => {
                totals.orders += 1;
                totals.revenue_cents = totals.revenue_cents.saturating_add(order.totals.total_cents);
            }
        }
    }
    days
}

pub fn build_stats_at(today: NaiveDate, data: &StoreData) -> StatsResponse {
    const WEEK_COUNT: usize = 8;

    let days = tally(data.orders.values());
    let day = |date: NaiveDate| days.get(&date).copied().unwrap_or_default();

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset as i64);
        let totals = day(date);
        last_7_days.push(DailyPoint {
            date: date.to_string(),
            orders: totals.orders,
            cancelled: totals.cancelled,
            revenue_cents: totals.revenue_cents,
        });
    }

    let current_week_start = week_start(today);
    let mut weekly_totals = Vec::with_capacity(WEEK_COUNT);
    let mut weekly_averages = Vec::with_capacity(WEEK_COUNT);

    for offset in (0..WEEK_COUNT).rev() {
        let start = current_week_start - Duration::weeks(offset as i64);
        let end = start + Duration::days(6);

        let mut orders = 0u64;
        let mut revenue_cents = 0u64;
        for day_offset in 0..7 {
            let totals = day(start + Duration::days(day_offset));
            orders = orders.saturating_add(totals.orders);
            revenue_cents = revenue_cents.saturating_add(totals.revenue_cents);
        }

        let days_counted = if today < start {
            0
        } else if today > end {
            7
        } else {
            (today - start).num_days() as u8 + 1
        };

        let denom = if days_counted == 0 { 1.0 } else { f64::from(days_counted) };

        weekly_totals.push(WeeklyPoint {
            week: week_label(start),
            start_date: start.to_string(),
            end_date: end.to_string(),
            orders,
            revenue_cents,
        });

        weekly_averages.push(WeeklyAveragePoint {
            week: week_label(start),
            days_counted,
            avg_orders: orders as f64 / denom,
            avg_revenue_cents: revenue_cents as f64 / denom,
        });
    }

    StatsResponse {
        last_7_days,
        weekly_totals,
        weekly_averages,
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}
