pub const ROSTERFORGE_DISPLAY_VERSION: &str = env!("ROSTERFORGE_DISPLAY_VERSION");
pub const ROSTERFORGE_BUILD_N: &str = env!("ROSTERFORGE_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "rosterforge {}\nBuild {}\nCostume roster editor for fighter mod projects",
        ROSTERFORGE_DISPLAY_VERSION, ROSTERFORGE_BUILD_N
    )
}
