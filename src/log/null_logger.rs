//! Stand-in backend used when the `logging` feature is disabled: only the `log` crate's global
//! maximum level is kept in sync, so disabled messages stay cheap.
use crate::log::LogSettings;

impl LogSettings {
    pub(in crate::log) fn apply(&mut self) {
        log::set_max_level(self.root_level);
    }
}
