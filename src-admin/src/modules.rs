//! Configuration modules served by the admin server.

use config_db::{Database, DbError};
use config_engine::{
    ArrayFieldDef, ConfigItem, ConfigRecord, ItemSchema, RecordSchema, Registry, SectionDef, Spec,
};

/// Site-wide settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneralConfig {
    pub site_name: String,
    pub admin_email: String,
    pub theme: String,
    pub maintenance_mode: bool,
    pub session_timeout_mins: i32,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_password: String,
}

impl ConfigRecord for GeneralConfig {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::<Self>::new()
            .text(
                "SiteName",
                "required,placeholder=My Site,column=site_name",
                |c| c.site_name.clone(),
                |c, v| c.site_name = v,
            )
            .text(
                "AdminEmail",
                "label=Admin E-mail,help=Receives alerts (and password resets),column=admin_email",
                |c| c.admin_email.clone(),
                |c, v| c.admin_email = v,
            )
            .text(
                "Theme",
                "type=select,options=light|dark|system,default=system",
                |c| c.theme.clone(),
                |c, v| c.theme = v,
            )
            .boolean(
                "MaintenanceMode",
                "help=Serve a maintenance page to visitors,column=maintenance_mode",
                |c| c.maintenance_mode,
                |c, v| c.maintenance_mode = v,
            )
            .integer(
                "SessionTimeoutMins",
                "label=Session Timeout (minutes),default=30,min=5,max=1440,section=session,column=session_timeout_mins",
                |c| c.session_timeout_mins,
                |c, v| c.session_timeout_mins = v,
            )
            .text(
                "SMTPHost",
                "label=SMTP Host,placeholder=smtp.example.com,section=mail,column=smtp_host",
                |c| c.smtp_host.clone(),
                |c, v| c.smtp_host = v,
            )
            .integer(
                "SMTPPort",
                "label=SMTP Port,default=587,min=1,max=65535,section=mail,column=smtp_port",
                |c| c.smtp_port,
                |c, v| c.smtp_port = v,
            )
            .text(
                "SMTPPassword",
                "label=SMTP Password,secret,section=mail,column=smtp_password",
                |c| c.smtp_password.clone(),
                |c, v| c.smtp_password = v,
            )
    }

    fn validate(&self) -> Result<(), String> {
        if !self.admin_email.is_empty() && !self.admin_email.contains('@') {
            return Err(format!("invalid admin e-mail: {}", self.admin_email));
        }
        if !(5..=1440).contains(&self.session_timeout_mins) {
            return Err(format!(
                "session timeout must be between 5 and 1440 minutes, got {}",
                self.session_timeout_mins
            ));
        }
        Ok(())
    }
}

/// One networked printer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Printer {
    pub name: String,
    pub host: String,
    pub access_code: String,
    pub serial: String,
    pub enabled: bool,
}

impl ConfigItem for Printer {
    fn schema() -> ItemSchema<Self> {
        ItemSchema::<Self>::new()
            .text("Name", "required", |p| p.name.clone(), |p, v| p.name = v)
            .text(
                "Host",
                "required,placeholder=192.168.1.50",
                |p| p.host.clone(),
                |p, v| p.host = v,
            )
            .text(
                "AccessCode",
                "secret,column=access_code",
                |p| p.access_code.clone(),
                |p, v| p.access_code = v,
            )
            .text(
                "Serial",
                "label=Serial Number,required",
                |p| p.serial.clone(),
                |p, v| p.serial = v,
            )
            .boolean("Enabled", "", |p| p.enabled, |p, v| p.enabled = v)
    }
}

/// The printer fleet and how often it is polled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrinterFleetConfig {
    pub printers: Vec<Printer>,
    pub poll_interval_secs: i32,
}

impl ConfigRecord for PrinterFleetConfig {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::<Self>::new()
            .integer(
                "PollIntervalSecs",
                "label=Poll Interval (seconds),default=5,min=1,max=60,column=poll_interval_secs",
                |c| c.poll_interval_secs,
                |c, v| c.poll_interval_secs = v,
            )
            .array::<Printer>(
                "Printers",
                "item=Printer,key=Serial",
                |c| &c.printers,
                |c| &mut c.printers,
            )
    }

    fn validate(&self) -> Result<(), String> {
        let mut serials = std::collections::HashSet::new();
        for printer in &self.printers {
            if !printer.serial.is_empty() && !serials.insert(printer.serial.as_str()) {
                return Err(format!("duplicate printer serial: {}", printer.serial));
            }
        }
        Ok(())
    }
}

/// Table definitions for every record-backed module.
pub const MIGRATIONS: &str = "
    CREATE TABLE IF NOT EXISTS general_config (
        version INTEGER PRIMARY KEY AUTOINCREMENT,
        created INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
        site_name TEXT,
        admin_email TEXT,
        theme TEXT,
        maintenance_mode INTEGER,
        session_timeout_mins INTEGER,
        smtp_host TEXT,
        smtp_port INTEGER,
        smtp_password TEXT
    ) STRICT;

    CREATE TABLE IF NOT EXISTS printers_config (
        version INTEGER PRIMARY KEY AUTOINCREMENT,
        created INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
        poll_interval_secs INTEGER,
        printers_json TEXT
    ) STRICT;
";

pub fn migrate(db: &Database) -> Result<(), DbError> {
    db.migrate(MIGRATIONS)
}

pub fn general_spec() -> Spec {
    Spec {
        description: "Site identity, sessions and outgoing mail.".into(),
        category: "system".into(),
        order: 0,
        sections: vec![
            SectionDef {
                name: "session".into(),
                title: "Sessions".into(),
                ..Default::default()
            },
            SectionDef {
                name: "mail".into(),
                title: "Outgoing Mail".into(),
                description: "Used for alerts and password resets.".into(),
                fields: vec![
                    "SMTPHost".into(),
                    "SMTPPort".into(),
                    "SMTPPassword".into(),
                ],
            },
        ],
        ..Spec::new::<GeneralConfig>("general", "General")
    }
}

pub fn printers_spec() -> Spec {
    Spec {
        description: "Printers polled for job status.".into(),
        category: "devices".into(),
        order: 10,
        array_fields: vec![ArrayFieldDef {
            field_name: "Printers".into(),
            help: "Access codes are kept when left blank.".into(),
            max_items: 16,
            ..Default::default()
        }],
        ..Spec::new::<PrinterFleetConfig>("printers", "Printers")
    }
}

pub fn about_spec() -> Spec {
    Spec {
        category: "system".into(),
        order: 100,
        ..Spec::info_page(
            "about",
            "About",
            concat!("config-admin ", env!("CARGO_PKG_VERSION")),
        )
    }
}

/// Register every module. Panics on a malformed spec.
pub fn register_all(registry: &mut Registry) {
    registry.must_register(general_spec());
    registry.must_register(printers_spec());
    registry.must_register(about_spec());
}
