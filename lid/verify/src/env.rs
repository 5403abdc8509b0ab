/*++

Licensed under the Apache-2.0 license.

File Name:

    env.rs

Abstract:

    File contains the file backed verification environment.

--*/

use crate::*;

/// Environment over an inventory store, the flash copies under a persist
/// directory, an os-release file and the reset flag file
pub struct SystemEnv<I: KeywordStore> {
    inventory: I,
    flash: FlashStore,
    os_release: OsRelease,
    reset_flag: ResetFlagFile,
}

impl<I: KeywordStore> SystemEnv<I> {
    pub fn new(
        inventory: I,
        flash: FlashStore,
        os_release: OsRelease,
        reset_flag: ResetFlagFile,
    ) -> Self {
        Self {
            inventory,
            flash,
            os_release,
            reset_flag,
        }
    }
}

impl<I: KeywordStore> LidVerificationEnv for SystemEnv<I> {
    fn inventory(&self) -> &dyn KeywordStore {
        &self.inventory
    }

    fn flash(&self) -> &dyn KeywordStore {
        &self.flash
    }

    fn running_version(&self) -> LidResult<String> {
        self.os_release.version()
    }

    fn running_extended_version(&self) -> LidResult<String> {
        self.os_release.extended_version()
    }

    fn reset_requested(&self) -> bool {
        self.reset_flag.exists()
    }

    fn request_reset(&self) -> LidResult<()> {
        self.reset_flag.create()
    }

    fn clear_reset(&self) -> LidResult<()> {
        self.reset_flag.remove()
    }
}
