//! Property-based tests for configuration module
//!
//! These tests use proptest to generate random configurations and verify
//! that valid ones survive serialization and invalid ones are rejected.

use super::*;
use proptest::prelude::*;

fn any_kind() -> impl Strategy<Value = DisplayKind> {
    prop_oneof![Just(DisplayKind::Physical), Just(DisplayKind::Virtual)]
}

fn any_pattern() -> impl Strategy<Value = CompositionPattern> {
    prop_oneof![
        Just(CompositionPattern::Gpu),
        Just(CompositionPattern::Hardware),
        Just(CompositionPattern::Mixed),
        Just(CompositionPattern::Alternate),
        Just(CompositionPattern::Idle),
    ]
}

fn any_dataspace() -> impl Strategy<Value = Dataspace> {
    prop_oneof![
        Just(Dataspace::Unknown),
        Just(Dataspace::Srgb),
        Just(Dataspace::SrgbLinear),
        Just(Dataspace::DisplayP3),
        Just(Dataspace::Bt2020),
    ]
}

// Strategy for generating fault schedules
prop_compose! {
    fn fault_plan()(
        fail_dequeue_every in proptest::option::of(1u64..50),
        fail_queue_every in proptest::option::of(1u64..50),
        fail_advance_every in proptest::option::of(1u64..50),
        fail_prepare_every in proptest::option::of(1u64..50),
        flip_client_target_every in proptest::option::of(1u64..50),
        fail_usage in any::<bool>(),
    ) -> FaultPlan {
        FaultPlan {
            fail_dequeue_every,
            fail_queue_every,
            fail_advance_every,
            fail_prepare_every,
            flip_client_target_every,
            fail_usage,
        }
    }
}

// Strategy for generating a valid display; index keeps names and ids unique
prop_compose! {
    fn valid_display(index: usize)(
        kind in any_kind(),
        width in 1i32..8192,
        height in 1i32..8192,
        protected in any::<bool>(),
        dataspace in any_dataspace(),
        has_hwc in any::<bool>(),
        buffer_count in 2usize..=3,
        composition in any_pattern(),
        faults in fault_plan(),
    ) -> DisplayConfig {
        DisplayConfig {
            name: format!("display-{}", index),
            kind,
            width,
            height,
            protected,
            dataspace,
            hwc_id: if has_hwc { Some(index as u64) } else { None },
            buffer_count,
            composition,
            faults,
        }
    }
}

prop_compose! {
    fn valid_config()(
        frames in 1u64..10_000,
        debug in any::<bool>(),
        acquire_timeout_ms in 0u64..1_000,
        first in valid_display(0),
        second in valid_display(1),
        third in valid_display(2),
        count in 1usize..=3,
    ) -> SimConfig {
        let mut displays = vec![first, second, third];
        displays.truncate(count);
        SimConfig {
            general: GeneralConfig { frames, debug, acquire_timeout_ms },
            displays,
        }
    }
}

proptest! {
    #[test]
    fn valid_configs_pass_validation(config in valid_config()) {
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn valid_configs_roundtrip_through_toml(config in valid_config()) {
        let text = config.to_toml_string().unwrap();
        let parsed = SimConfig::from_toml_str(&text).unwrap();
        prop_assert_eq!(config, parsed);
    }

    #[test]
    fn non_positive_sizes_are_rejected(
        mut config in valid_config(),
        width in -4096i32..=0,
    ) {
        config.displays[0].width = width;
        prop_assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_buffer_counts_are_rejected(
        mut config in valid_config(),
        buffer_count in prop_oneof![0usize..2, 4usize..64],
    ) {
        config.displays[0].buffer_count = buffer_count;
        prop_assert!(config.validate().is_err());
    }
}
