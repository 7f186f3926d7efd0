//! EventFilter - direction / success / blank-record policy

use contracts::{CanonicalEvent, CollectorBlueprint, DeviceDescriptor};

/// Accepts or rejects canonical events per the effective policy for one
/// device. All settings resolve device-then-global at construction.
pub struct EventFilter {
    allowed_directions: Option<Vec<String>>,
    include_unknown_direction: bool,
    only_success: bool,
    skip_blank_records: bool,
}

impl EventFilter {
    pub fn new(blueprint: &CollectorBlueprint, device: &DeviceDescriptor) -> Self {
        Self {
            allowed_directions: blueprint.allowed_directions(device).map(<[String]>::to_vec),
            include_unknown_direction: blueprint.include_unknown_direction(device),
            only_success: blueprint.only_success(device),
            skip_blank_records: blueprint.skip_blank_records(device),
        }
    }

    pub fn accept(&self, event: &CanonicalEvent) -> bool {
        if self.skip_blank_records && event.is_blank() {
            return false;
        }

        if let Some(allow) = &self.allowed_directions {
            let listed = allow
                .iter()
                .any(|want| want.eq_ignore_ascii_case("ANY") || event.direction.matches(want));
            if !listed {
                return false;
            }
            // UNKNOWN needs its own opt-in even when listed
            if event.direction.is_unknown() && !self.include_unknown_direction {
                return false;
            }
        }

        if self.only_success && event.success != Some(true) {
            return false;
        }

        true
    }
}
