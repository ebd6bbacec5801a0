use crate::{ConfigItem, ConfigRecord, ItemSchema, RecordSchema, SectionDef, Spec};

pub(super) const TEST_TABLES: &str = "
    CREATE TABLE test_config (
        version INTEGER PRIMARY KEY AUTOINCREMENT,
        created INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
        api_key TEXT,
        endpoint TEXT,
        timeout INTEGER,
        enabled INTEGER,
        log_level TEXT,
        notes TEXT
    ) STRICT;

    CREATE TABLE printers_config (
        version INTEGER PRIMARY KEY AUTOINCREMENT,
        created INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
        poll_interval_secs INTEGER,
        printers_json TEXT
    ) STRICT;
";

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct TestConfig {
    pub api_key: String,
    pub endpoint: String,
    pub timeout: i32,
    pub enabled: bool,
    pub log_level: String,
    pub notes: String,
}

impl ConfigRecord for TestConfig {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::<Self>::new()
            .text(
                "APIKey",
                "label=API Key,secret,column=api_key",
                |c| c.api_key.clone(),
                |c, v| c.api_key = v,
            )
            .text(
                "Endpoint",
                "label=Endpoint,placeholder=https://api.example.com",
                |c| c.endpoint.clone(),
                |c, v| c.endpoint = v,
            )
            .integer(
                "Timeout",
                "label=Timeout (seconds),default=30,min=1,max=300,section=advanced",
                |c| c.timeout,
                |c, v| c.timeout = v,
            )
            .boolean("Enabled", "label=Enabled", |c| c.enabled, |c, v| c.enabled = v)
            .text(
                "LogLevel",
                "label=Log Level,options=debug|info|warn|error,section=advanced,column=log_level",
                |c| c.log_level.clone(),
                |c, v| c.log_level = v,
            )
            .text(
                "Notes",
                "label=Notes,multiline,rows=5",
                |c| c.notes.clone(),
                |c, v| c.notes = v,
            )
    }

    fn validate(&self) -> Result<(), String> {
        if self.timeout > 300 {
            return Err(format!("timeout {} exceeds 300 seconds", self.timeout));
        }
        Ok(())
    }
}

pub(super) fn test_spec() -> Spec {
    Spec {
        sections: vec![SectionDef {
            name: "advanced".into(),
            title: "Advanced Settings".into(),
            ..Default::default()
        }],
        ..Spec::new::<TestConfig>("test", "Test Config")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct PrinterConfig {
    pub name: String,
    pub host: String,
    pub access_code: String,
    pub serial: String,
}

impl PrinterConfig {
    pub fn new(name: &str, host: &str, access_code: &str, serial: &str) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            access_code: access_code.into(),
            serial: serial.into(),
        }
    }
}

impl ConfigItem for PrinterConfig {
    fn schema() -> ItemSchema<Self> {
        ItemSchema::<Self>::new()
            .text("Name", "label=Name,required", |p| p.name.clone(), |p, v| p.name = v)
            .text("Host", "label=Host,required", |p| p.host.clone(), |p, v| p.host = v)
            .text(
                "AccessCode",
                "label=Access Code,secret,column=access_code",
                |p| p.access_code.clone(),
                |p, v| p.access_code = v,
            )
            .text(
                "Serial",
                "label=Serial Number,required",
                |p| p.serial.clone(),
                |p, v| p.serial = v,
            )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct PrintersConfig {
    pub printers: Vec<PrinterConfig>,
    pub poll_interval_secs: i32,
}

impl ConfigRecord for PrintersConfig {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::<Self>::new()
            .array::<PrinterConfig>(
                "Printers",
                "label=Printers,item=Printer,key=Serial",
                |c| &c.printers,
                |c| &mut c.printers,
            )
            .integer(
                "PollIntervalSecs",
                "label=Poll Interval,default=5,min=1,max=60,column=poll_interval_secs",
                |c| c.poll_interval_secs,
                |c, v| c.poll_interval_secs = v,
            )
    }
}

pub(super) fn printers_spec() -> Spec {
    Spec::new::<PrintersConfig>("printers", "Printers")
}
