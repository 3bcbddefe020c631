//! Fitbit activity-name classification and fallback estimation.
//!
//! The TCX and FIT taxonomies diverged upstream and are kept as two
//! independent tables; tests pin the differences so they never get
//! "cleaned up" into one silently different mapping.

use crate::fit::profile::{Sport, SubSport};
use fitbit_client::Activity;

/// Assumed average per-step distance, in meters.
pub const STRIDE_LENGTH_M: f64 = 0.762;

/// Fitbit activity name → TCX `Sport` attribute.
pub fn tcx_sport(activity_name: &str) -> &'static str {
    match activity_name {
        "Run" | "Treadmill" => "Running",
        "Walk" => "Walking",
        "Hike" => "Hiking",
        "Bike" => "Biking",
        "Swim" => "Swimming",
        _ => "Other",
    }
}

pub fn tcx_distance_relevant(activity_name: &str) -> bool {
    matches!(
        activity_name,
        "Run" | "Walk" | "Hike" | "Bike" | "Treadmill" | "Swim" | "Sport"
    )
}

/// Fitbit activity name → FIT sport code.
pub fn fit_sport(activity_name: &str) -> Sport {
    match activity_name {
        "Run" | "Treadmill" => Sport::Running,
        "Walk" | "Walking" => Sport::Walking,
        "Hike" => Sport::Hiking,
        "Bike" | "Biking" | "Outdoor Bike" => Sport::Cycling,
        "Swim" => Sport::Swimming,
        "Elliptical" | "Strength Training" | "Workout" | "Weights" => Sport::FitnessEquipment,
        "Aerobic Workout" | "Sport" => Sport::Soccer,
        _ => Sport::FitnessEquipment,
    }
}

pub fn fit_sub_sport(activity_name: &str) -> Option<SubSport> {
    match activity_name {
        "Weights" => Some(SubSport::StrengthTraining),
        "Elliptical" => Some(SubSport::Elliptical),
        _ => None,
    }
}

pub fn fit_distance_relevant(activity_name: &str) -> bool {
    matches!(
        activity_name,
        "Run"
            | "Walk"
            | "Walking"
            | "Hike"
            | "Bike"
            | "Biking"
            | "Outdoor Bike"
            | "Treadmill"
            | "Swim"
            | "Swimming"
            | "Sport"
            | "Elliptical"
            | "Aerobic Workout"
    )
}

pub fn fit_elevation_relevant(activity_name: &str) -> bool {
    matches!(
        activity_name,
        "Run"
            | "Walk"
            | "Walking"
            | "Hike"
            | "Bike"
            | "Biking"
            | "Outdoor Bike"
            | "Treadmill"
            | "Elliptical"
            | "Hiking"
            | "Running"
            | "Cycling"
            | "Aerobic Workout"
            | "Sport"
    )
}

/// Distance in kilometers, estimating from steps when the raw value is
/// exactly zero and the activity type warrants it. The fallback fires at
/// most once per activity.
pub fn effective_distance_km(activity: &Activity, distance_relevant: bool) -> f64 {
    let raw = activity.distance.unwrap_or(0.0);
    if raw != 0.0 {
        return raw;
    }
    let steps = activity.steps.unwrap_or(0);
    if steps > 0 && distance_relevant {
        let estimated = steps as f64 * STRIDE_LENGTH_M / 1000.0;
        tracing::info!(
            activity = %activity.activity_name,
            steps,
            estimated_km = estimated,
            "estimated distance from steps"
        );
        estimated
    } else {
        tracing::warn!(
            activity = %activity.activity_name,
            "no distance found, using 0.0 km"
        );
        0.0
    }
}

/// Elevation gain in whole meters, zero outside the FIT relevance set.
pub fn effective_elevation_gain_m(activity: &Activity) -> u32 {
    if fit_elevation_relevant(&activity.activity_name) {
        activity.elevation_gain.unwrap_or(0.0).round() as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(name: &str, distance: Option<f64>, steps: Option<u64>) -> Activity {
        let value = serde_json::json!({
            "logId": 1,
            "activityName": name,
            "startTime": "2024-05-01T06:30:00.000-07:00",
            "duration": 1_800_000,
            "distance": distance,
            "steps": steps,
            "logType": "tracker"
        });
        Activity::from_value(&value).expect("activity")
    }

    #[test]
    fn unmapped_names_fall_back_to_defaults() {
        assert_eq!(tcx_sport("Yoga"), "Other");
        assert_eq!(fit_sport("Yoga"), Sport::FitnessEquipment);
        assert!(fit_sub_sport("Yoga").is_none());
    }

    #[test]
    fn sub_sport_refinement_is_limited_to_two_names() {
        assert_eq!(fit_sub_sport("Weights"), Some(SubSport::StrengthTraining));
        assert_eq!(fit_sub_sport("Elliptical"), Some(SubSport::Elliptical));
        assert!(fit_sub_sport("Run").is_none());
    }

    // The two relevance sets intentionally diverge between formats.
    #[test]
    fn distance_relevance_sets_diverge_between_formats() {
        assert!(!tcx_distance_relevant("Elliptical"));
        assert!(fit_distance_relevant("Elliptical"));
        assert!(!tcx_distance_relevant("Aerobic Workout"));
        assert!(fit_distance_relevant("Aerobic Workout"));
        assert!(tcx_distance_relevant("Sport"));
        assert!(fit_distance_relevant("Sport"));
    }

    #[test]
    fn distance_fallback_fires_only_on_exact_zero_and_relevant_type() {
        let a = activity("Walk", Some(0.0), Some(1000));
        assert_eq!(effective_distance_km(&a, tcx_distance_relevant("Walk")), 0.762);

        // a reported distance, however small, is never overridden
        let a = activity("Walk", Some(0.001), Some(1000));
        assert_eq!(effective_distance_km(&a, true), 0.001);

        // irrelevant type stays at zero even with steps
        let a = activity("Yoga", Some(0.0), Some(1000));
        assert_eq!(effective_distance_km(&a, tcx_distance_relevant("Yoga")), 0.0);

        // no steps, nothing to estimate from
        let a = activity("Walk", Some(0.0), None);
        assert_eq!(effective_distance_km(&a, true), 0.0);
    }

    #[test]
    fn elevation_only_for_relevant_types_and_rounded() {
        let mut a = activity("Hike", None, None);
        a.elevation_gain = Some(12.6);
        assert_eq!(effective_elevation_gain_m(&a), 13);

        let mut a = activity("Swim", None, None);
        a.elevation_gain = Some(12.6);
        assert_eq!(effective_elevation_gain_m(&a), 0);
    }
}
