pub fn get_signature(version: &str) -> String {
    format!(
        r#"
   __      __   __      __        wowsync (addon sync for World of Warcraft)
   \ \ /\ / /__ \ \ /\ / /
    \ V  V / _ \ \ V  V /         Reads addons.json, installs the latest releases,
     \_/\_/\___/  \_/\_/          remembers them in addons.lock.json.

                                  v{}
"#,
        version
    )
}
