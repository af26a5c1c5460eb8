// * IdentityProfile defines how the headless browser presents itself.
// * Headless Chrome advertises "HeadlessChrome" in its UA, which many storefronts block.
pub struct IdentityProfile {
    pub chrome_version: &'static str,
    pub user_agent: String,
    pub window_size: (u32, u32),
    pub accept_language: &'static str,
}

impl IdentityProfile {
    // * Generates a desktop Chrome 120 profile on Windows.
    pub fn generate_chrome_120() -> Self {
        let major_version = "120";
        let full_version = "120.0.6099.109";

        Self {
            chrome_version: major_version,
            user_agent: format!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
                full_version
            ),
            window_size: (1920, 1080),
            accept_language: "en-US,en;q=0.9",
        }
    }

    // * Command-line switches applying this profile to a Chromium launch.
    pub fn browser_args(&self) -> Vec<String> {
        vec![
            format!("--user-agent={}", self.user_agent),
            format!("--lang={}", self.accept_language.split(',').next().unwrap_or("en-US")),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
        ]
    }
}

impl Default for IdentityProfile {
    fn default() -> Self {
        Self::generate_chrome_120()
    }
}
