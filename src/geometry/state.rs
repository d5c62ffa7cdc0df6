/// Lifecycle of a geometry inside its scene.
///
/// ```text
///   Enabled <--disable/enable--> Disabled
///      \                            /
///       +-------- erase -----------+
///                  |
///               Erasing   (absorbing, reclaimed by the next commit)
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Enabled,
    Disabled,
    Erasing,
}

impl LifecycleState {
    pub fn is_enabled(self) -> bool {
        self == LifecycleState::Enabled
    }

    pub fn is_disabled(self) -> bool {
        self == LifecycleState::Disabled
    }

    pub fn is_erasing(self) -> bool {
        self == LifecycleState::Erasing
    }

    // The transition functions return the next state, or `None` when the call
    // should be a no-op.

    pub(crate) fn on_enable(self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Disabled => Some(LifecycleState::Enabled),
            LifecycleState::Enabled | LifecycleState::Erasing => None,
        }
    }

    pub(crate) fn on_disable(self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Enabled => Some(LifecycleState::Disabled),
            LifecycleState::Disabled | LifecycleState::Erasing => None,
        }
    }

    pub(crate) fn on_erase(self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Enabled | LifecycleState::Disabled => Some(LifecycleState::Erasing),
            LifecycleState::Erasing => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LifecycleState::*;

    #[test]
    fn erasing_absorbs_everything() {
        assert_eq!(Erasing.on_enable(), None);
        assert_eq!(Erasing.on_disable(), None);
        assert_eq!(Erasing.on_erase(), None);
    }

    #[test]
    fn enable_and_disable_only_toggle() {
        assert_eq!(Disabled.on_enable(), Some(Enabled));
        assert_eq!(Enabled.on_enable(), None);
        assert_eq!(Enabled.on_disable(), Some(Disabled));
        assert_eq!(Disabled.on_disable(), None);
        assert_eq!(Enabled.on_erase(), Some(Erasing));
        assert_eq!(Disabled.on_erase(), Some(Erasing));
    }
}
