#[cfg(test)]
mod schedule_tests {
    use crate::core::schedule::{
        compute_sleep_plan, duration_until_time_of_day, RemoteConfig, SchedulePolicy, SleepPlan,
        TargetTime,
    };

    const MILLIS_PER_DAY: u64 = 86_400_000;

    fn policy(target: Option<TargetTime>) -> SchedulePolicy {
        SchedulePolicy {
            timezone: chrono_tz::UTC,
            target_time_of_day: target,
            default_sleep_ms: MILLIS_PER_DAY,
            fallback_sleep_ms: 300_000,
        }
    }

    // 2024-01-01 00:00:00 UTC
    const BASE_EPOCH_MS: i64 = 1_704_067_200_000;

    fn at_time_of_day(hour: u64, minute: u64, second: u64) -> i64 {
        BASE_EPOCH_MS + ((hour * 3_600 + minute * 60 + second) * 1_000) as i64
    }

    #[test]
    fn test_target_before_now_wraps_past_midnight() {
        // Given: 現在 20:00、目標 18:00
        let now = at_time_of_day(20, 0, 0);
        let target = TargetTime { hour: 18, minute: 0 };

        // When
        let duration = duration_until_time_of_day(now, chrono_tz::UTC, target).unwrap();

        // Then: 日境界をまたいで22時間後
        assert_eq!(duration, 22 * 3_600 * 1_000);
    }

    #[test]
    fn test_target_after_now_sleeps_until_target() {
        // Given: 現在 10:00、目標 18:00
        let now = at_time_of_day(10, 0, 0);
        let target = TargetTime { hour: 18, minute: 0 };

        let duration = duration_until_time_of_day(now, chrono_tz::UTC, target).unwrap();
        assert_eq!(duration, 8 * 3_600 * 1_000);
    }

    #[test]
    fn test_now_equal_to_target_sleeps_full_day() {
        // 境界条件: 現在時刻がちょうど目標なら0ではなく丸一日
        let now = at_time_of_day(18, 0, 0);
        let target = TargetTime { hour: 18, minute: 0 };

        let duration = duration_until_time_of_day(now, chrono_tz::UTC, target).unwrap();
        assert_eq!(duration, MILLIS_PER_DAY);
    }

    #[test]
    fn test_duration_is_always_positive_and_at_most_one_day() {
        let target = TargetTime { hour: 7, minute: 30 };
        for hour in 0..24u64 {
            for minute in [0u64, 13, 30, 59] {
                let now = at_time_of_day(hour, minute, 7);
                let duration =
                    duration_until_time_of_day(now, chrono_tz::UTC, target).unwrap();

                assert!(duration > 0, "hour={} minute={}", hour, minute);
                assert!(duration <= MILLIS_PER_DAY, "hour={} minute={}", hour, minute);

                // now + duration は目標時刻の同一秒に着地する
                let wake_ms = now + duration as i64;
                let wake_seconds_of_day = (wake_ms / 1_000) % 86_400;
                assert_eq!(wake_seconds_of_day, 7 * 3_600 + 30 * 60);
            }
        }
    }

    #[test]
    fn test_subsecond_now_is_truncated() {
        // 秒未満は切り捨てて計算する
        let now = at_time_of_day(10, 0, 0);
        let target = TargetTime { hour: 18, minute: 0 };

        let exact = duration_until_time_of_day(now, chrono_tz::UTC, target).unwrap();
        let with_millis = duration_until_time_of_day(now + 900, chrono_tz::UTC, target).unwrap();
        assert_eq!(exact, with_millis);
    }

    #[test]
    fn test_timezone_offset_is_respected() {
        // epoch 0 はJSTで 09:00。目標10:00なら1時間後。
        let duration = duration_until_time_of_day(
            0,
            chrono_tz::Asia::Tokyo,
            TargetTime { hour: 10, minute: 0 },
        )
        .unwrap();
        assert_eq!(duration, 3_600 * 1_000);
    }

    #[test]
    fn test_remote_future_wakeup_takes_priority() {
        let now = at_time_of_day(12, 0, 0);
        let remote = RemoteConfig {
            next_wakeup_time_ms: Some(now + 3_600_000),
        };

        let plan = compute_sleep_plan(
            now,
            &policy(Some(TargetTime { hour: 18, minute: 0 })),
            Some(&remote),
        );
        assert_eq!(plan, SleepPlan::UntilAbsoluteTime(now + 3_600_000));
        assert_eq!(plan.timer_duration_ms(now), Some(3_600_000));
    }

    #[test]
    fn test_remote_stale_wakeup_falls_back_to_default() {
        // 過去・同時刻の起床時刻は0や負のスリープにせず既定時間へ
        let now = at_time_of_day(12, 0, 0);
        for stale in [now, now - 1, now - 86_400_000] {
            let remote = RemoteConfig {
                next_wakeup_time_ms: Some(stale),
            };
            let plan = compute_sleep_plan(now, &policy(None), Some(&remote));
            assert_eq!(plan, SleepPlan::FixedDuration(MILLIS_PER_DAY));
        }
    }

    #[test]
    fn test_remote_without_field_uses_local_policy() {
        let now = at_time_of_day(10, 0, 0);
        let remote = RemoteConfig {
            next_wakeup_time_ms: None,
        };

        // 定時起床が設定されていればそちら
        let plan = compute_sleep_plan(
            now,
            &policy(Some(TargetTime { hour: 18, minute: 0 })),
            Some(&remote),
        );
        assert_eq!(plan, SleepPlan::FixedDuration(8 * 3_600 * 1_000));

        // 無ければ既定時間
        let plan = compute_sleep_plan(now, &policy(None), Some(&remote));
        assert_eq!(plan, SleepPlan::FixedDuration(MILLIS_PER_DAY));
    }

    #[test]
    fn test_no_remote_no_target_uses_default() {
        let now = at_time_of_day(3, 45, 0);
        let plan = compute_sleep_plan(now, &policy(None), None);
        assert_eq!(plan, SleepPlan::FixedDuration(MILLIS_PER_DAY));
    }

    #[test]
    fn test_remote_config_deserialization() {
        let config: RemoteConfig =
            serde_json::from_str(r#"{"nextWakeupTimeMs": 1704067200000}"#).unwrap();
        assert_eq!(config.next_wakeup_time_ms, Some(1_704_067_200_000));

        // フィールド省略は有効
        let config: RemoteConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.next_wakeup_time_ms, None);

        // 型違いはデシリアライズエラー（呼び出し側でConfigError扱い）
        let result = serde_json::from_str::<RemoteConfig>(r#"{"nextWakeupTimeMs": "soon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_timer_duration_for_plan_variants() {
        let now = at_time_of_day(0, 0, 0);

        assert_eq!(
            SleepPlan::FixedDuration(5_000).timer_duration_ms(now),
            Some(5_000)
        );
        assert_eq!(
            SleepPlan::UntilAbsoluteTime(now + 90_000).timer_duration_ms(now),
            Some(90_000)
        );
        // 過去に回り込んだ絶対時刻は負にならない
        assert_eq!(
            SleepPlan::UntilAbsoluteTime(now - 90_000).timer_duration_ms(now),
            Some(0)
        );
        assert_eq!(
            SleepPlan::UntilNextOfEvents {
                timer_ms: Some(60_000),
                external_trigger: true
            }
            .timer_duration_ms(now),
            Some(60_000)
        );
        assert_eq!(
            SleepPlan::UntilNextOfEvents {
                timer_ms: None,
                external_trigger: true
            }
            .timer_duration_ms(now),
            None
        );
    }
}
