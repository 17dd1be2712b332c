use std::path::PathBuf;

const CURRENT_LOG: &str = "Player.log";
const PREVIOUS_LOG: &str = "Player-prev.log";

/// The platform-standard locations the game client writes its log to.
/// Returns only files that exist, rotated-previous file first when
/// |include_prev| is set so history lands before the live tail.
pub fn default_log_paths(include_prev: bool) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let Some(home) = dirs::home_dir() else {
        return paths;
    };

    let roots = [
        // Windows: Unity's LocalLow application log directory.
        home.join("AppData")
            .join("LocalLow")
            .join("Wizards Of The Coast")
            .join("MTGA"),
        // macOS.
        home.join("Library")
            .join("Logs")
            .join("Wizards Of The Coast")
            .join("MTGA"),
    ];

    for root in roots {
        if include_prev {
            let prev = root.join(PREVIOUS_LOG);
            if prev.is_file() {
                paths.push(prev);
            }
        }
        let current = root.join(CURRENT_LOG);
        if current.is_file() {
            paths.push(current);
        }
    }
    paths
}
