/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# walkie configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[signaling]
# url = "ws://localhost:3000/ws"
# reconnection_attempts = 5        # 0-100
# reconnection_delay_ms = 1000     # 100-60000
# max_reconnection_delay_ms = 5000 # >= reconnection_delay_ms
# connect_timeout_secs = 15        # 1-120

[resilience]
# grace_period_ms = 2000           # 100-60000
# retry_interval_ms = 2000         # 100-60000

[audio]
# input_device = "default"
# acquire_on_start = true

[channel]
# default_channel = ""

[logging]
# level = "INFO"                   # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
