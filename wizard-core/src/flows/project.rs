// Project creation flow
//
// Nine numbered steps plus one conditional step ("New Database") that only
// appears while `databaseSelection.createNewDatabase` is set.

use super::{StepValidator, WizardFlow};
use crate::models::steps::StepDescriptor;
use crate::models::validation::{codes, StepValidationResult, ValidationReport};
use crate::utils::validation::{
    first_duplicate, is_blank, is_valid_email, is_valid_identifier, is_valid_owner_id,
    is_valid_project_name, is_valid_repository_name, parse_http_url, validate_database_name,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

pub const SUPPORTED_ENGINES: &[&str] = &["postgres", "sqlserver", "mysql", "oracle"];
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1_000;
pub const MAX_COMMENTS_LEN: usize = 2_000;
pub const MIN_PASSWORD_LEN: usize = 12;
pub const MAX_DATABASE_SIZE_GB: u32 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStep {
    GeneralInfo,
    SetupType,
    DatabaseSelection,
    NewDatabase,
    Environments,
    DatabaseAuth,
    Notifications,
    Github,
    Entitlements,
    Review,
}

impl ProjectStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GeneralInfo => "general-info",
            Self::SetupType => "setup-type",
            Self::DatabaseSelection => "database-selection",
            Self::NewDatabase => "new-database",
            Self::Environments => "environments",
            Self::DatabaseAuth => "database-auth",
            Self::Notifications => "notifications",
            Self::Github => "github",
            Self::Entitlements => "entitlements",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for ProjectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =========================
// Form data
// =========================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralInfo {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupKind {
    Standard,
    Custom,
    Migration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupType {
    pub setup_type: Option<SetupKind>,
    /// Required for migrations.
    pub source_project: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    pub name: String,
    pub engine: String,
    pub entitlement_bases: Vec<String>,
    pub schemas: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSelection {
    pub create_new_database: bool,
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewDatabaseConfig {
    pub name: String,
    pub engine: String,
    pub version: String,
    pub size_gb: u32,
    pub region: String,
    pub high_availability: bool,
}

impl Default for NewDatabaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            engine: "postgres".to_string(),
            version: String::new(),
            size_gb: 0,
            region: String::new(),
            high_availability: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environment {
    pub name: String,
    pub kind: EnvironmentKind,
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environments {
    pub environments: Vec<Environment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMethod {
    Password,
    ServiceAccount,
    Kerberos,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseAuth {
    pub method: Option<AuthMethod>,
    pub username: String,
    pub password: String,
    pub secret_reference: String,
    pub service_principal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notifications {
    pub email_enabled: bool,
    pub recipients: Vec<String>,
    pub webhook_url: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoVisibility {
    #[default]
    Private,
    Internal,
    Public,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Github {
    pub create_repository: bool,
    pub organization: String,
    pub repository_name: String,
    pub existing_repository_url: String,
    pub visibility: RepoVisibility,
}

impl Default for Github {
    fn default() -> Self {
        Self {
            create_repository: true,
            organization: String::new(),
            repository_name: String::new(),
            existing_repository_url: String::new(),
            visibility: RepoVisibility::Private,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entitlements {
    pub entitlement_owner: String,
    pub technical_owner: String,
    pub approvers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    pub confirmed: bool,
    pub comments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectFormData {
    pub general_info: GeneralInfo,
    pub setup_type: SetupType,
    pub database_selection: DatabaseSelection,
    /// Present iff `database_selection.create_new_database`.
    pub new_database: Option<NewDatabaseConfig>,
    pub environments: Environments,
    pub database_auth: DatabaseAuth,
    pub notifications: Notifications,
    pub github: Github,
    pub entitlements: Entitlements,
    pub review: Review,
}

// =========================
// Flow
// =========================

pub struct ProjectCreationFlow;

fn creates_new_database(data: &ProjectFormData) -> bool {
    data.database_selection.create_new_database
}

impl WizardFlow for ProjectCreationFlow {
    type Step = ProjectStep;
    type Data = ProjectFormData;

    const NAME: &'static str = "project-creation";

    fn steps() -> Vec<StepDescriptor<ProjectStep, ProjectFormData>> {
        use ProjectStep::*;
        vec![
            StepDescriptor::new(
                GeneralInfo,
                "General Information",
                "Name and describe the project",
                "mdi-information-outline",
                "generalInfo",
            ),
            StepDescriptor::new(
                SetupType,
                "Setup Type",
                "Choose how the project is created",
                "mdi-cog-outline",
                "setupType",
            ),
            StepDescriptor::new(
                DatabaseSelection,
                "Database Selection",
                "Pick existing databases or request a new one",
                "mdi-database-search",
                "databaseSelection",
            ),
            StepDescriptor::new(
                NewDatabase,
                "New Database",
                "Configure the database to provision",
                "mdi-database-plus",
                "newDatabase",
            )
            .visible_when(creates_new_database),
            StepDescriptor::new(
                Environments,
                "Environments",
                "Select deployment environments",
                "mdi-server-network",
                "environments",
            ),
            StepDescriptor::new(
                DatabaseAuth,
                "Database Authentication",
                "How the project connects to its databases",
                "mdi-key-variant",
                "databaseAuth",
            ),
            StepDescriptor::new(
                Notifications,
                "Notifications",
                "Who hears about project events",
                "mdi-bell-outline",
                "notifications",
            )
            .optional(),
            StepDescriptor::new(
                Github,
                "GitHub Repository",
                "Create or link the source repository",
                "mdi-github",
                "github",
            ),
            StepDescriptor::new(
                Entitlements,
                "Entitlements",
                "Owners and approvers",
                "mdi-account-key",
                "entitlements",
            ),
            StepDescriptor::new(
                Review,
                "Review",
                "Confirm and create",
                "mdi-check-decagram",
                "review",
            ),
        ]
    }

    fn validator(step: ProjectStep) -> StepValidator<ProjectFormData> {
        match step {
            ProjectStep::GeneralInfo => validate_general_info,
            ProjectStep::SetupType => validate_setup_type,
            ProjectStep::DatabaseSelection => validate_database_selection,
            ProjectStep::NewDatabase => validate_new_database,
            ProjectStep::Environments => validate_environments,
            ProjectStep::DatabaseAuth => validate_database_auth,
            ProjectStep::Notifications => validate_notifications,
            ProjectStep::Github => validate_github,
            ProjectStep::Entitlements => validate_entitlements,
            ProjectStep::Review => validate_review,
        }
    }

    fn normalize(data: &mut ProjectFormData) {
        match (data.database_selection.create_new_database, &data.new_database) {
            (true, None) => data.new_database = Some(NewDatabaseConfig::default()),
            (false, Some(_)) => data.new_database = None,
            _ => {}
        }
    }

    fn draft_title(data: &ProjectFormData) -> Option<String> {
        let name = data.general_info.name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    fn summarize(data: &ProjectFormData) -> serde_json::Value {
        json!({
            "name": data.general_info.name.trim(),
            "setupType": data.setup_type.setup_type,
            "databases": data
                .database_selection
                .databases
                .iter()
                .map(|d| d.name.trim().to_string())
                .collect::<Vec<_>>(),
            "newDatabase": data.new_database.as_ref().map(|d| json!({
                "name": d.name.trim(),
                "engine": d.engine.trim(),
                "sizeGb": d.size_gb,
            })),
            "environments": data
                .environments
                .environments
                .iter()
                .map(|e| e.name.trim().to_string())
                .collect::<Vec<_>>(),
            "repository": repository_label(&data.github),
            "entitlementOwner": data.entitlements.entitlement_owner.trim(),
            "technicalOwner": data.entitlements.technical_owner.trim(),
        })
    }
}

fn repository_label(github: &Github) -> String {
    if github.create_repository {
        format!(
            "{}/{}",
            github.organization.trim(),
            github.repository_name.trim()
        )
    } else {
        github.existing_repository_url.trim().to_string()
    }
}

fn is_supported_engine(engine: &str) -> bool {
    let e = engine.trim().to_ascii_lowercase();
    SUPPORTED_ENGINES.contains(&e.as_str())
}

// =========================
// Validators
// =========================

fn validate_general_info(data: &ProjectFormData) -> StepValidationResult {
    let info = &data.general_info;
    let mut report = ValidationReport::new();

    if report.require("name", &info.name, "Project name") {
        if info.name.trim().chars().count() > MAX_NAME_LEN {
            report.error(
                "name",
                codes::TOO_LONG,
                format!("Project name cannot exceed {} characters", MAX_NAME_LEN),
            );
        } else if !is_valid_project_name(&info.name) {
            report.error(
                "name",
                codes::INVALID_FORMAT,
                "Project name may only contain letters, digits, spaces, '.', '_' and '-'",
            );
        }
    }

    if is_blank(&info.description) {
        report.warning(
            "description",
            codes::RECOMMENDED,
            "A short description helps reviewers",
        );
    } else if info.description.chars().count() > MAX_DESCRIPTION_LEN {
        report.error(
            "description",
            codes::TOO_LONG,
            format!(
                "Description cannot exceed {} characters",
                MAX_DESCRIPTION_LEN
            ),
        );
    }

    if let Some(dup) = first_duplicate(info.tags.iter().map(String::as_str)) {
        report.warning("tags", codes::DUPLICATE, format!("Tag '{}' is listed twice", dup));
    }

    report.finish()
}

fn validate_setup_type(data: &ProjectFormData) -> StepValidationResult {
    let setup = &data.setup_type;
    let mut report = ValidationReport::new();

    match setup.setup_type {
        None => report.error("setupType", codes::REQUIRED, "Select a setup type"),
        Some(SetupKind::Migration) => {
            report.require("sourceProject", &setup.source_project, "Source project");
        }
        Some(SetupKind::Custom) => {
            if is_blank(&setup.template) {
                report.warning(
                    "template",
                    codes::RECOMMENDED,
                    "Custom setups usually start from a template",
                );
            }
        }
        Some(SetupKind::Standard) => {}
    }

    report.finish()
}

fn validate_database_selection(data: &ProjectFormData) -> StepValidationResult {
    let selection = &data.database_selection;
    let mut report = ValidationReport::new();

    if !selection.create_new_database && selection.databases.is_empty() {
        report.error(
            "databases",
            codes::MIN_ITEMS,
            "At least one database configuration is required",
        );
    }

    for (i, db) in selection.databases.iter().enumerate() {
        let prefix = format!("databases[{}]", i);
        report.require(&format!("{}.name", prefix), &db.name, "Database name");

        if report.require(&format!("{}.engine", prefix), &db.engine, "Database engine")
            && !is_supported_engine(&db.engine)
        {
            report.error(
                format!("{}.engine", prefix),
                codes::UNSUPPORTED,
                format!("Unsupported database engine '{}'", db.engine.trim()),
            );
        }

        if db.entitlement_bases.iter().all(|b| is_blank(b)) {
            report.error(
                format!("{}.entitlementBases", prefix),
                codes::MIN_ITEMS,
                "At least one entitlement base is required",
            );
        }

        if db.schemas.is_empty() {
            report.warning(
                format!("{}.schemas", prefix),
                codes::RECOMMENDED,
                "No schemas selected; the whole database will be granted",
            );
        }
        for (j, schema) in db.schemas.iter().enumerate() {
            if !is_valid_identifier(schema) {
                report.error(
                    format!("{}.schemas[{}]", prefix, j),
                    codes::INVALID_FORMAT,
                    format!("'{}' is not a valid schema name", schema.trim()),
                );
            }
        }
        if let Some(dup) = first_duplicate(db.schemas.iter().map(String::as_str)) {
            report.error(
                format!("{}.schemas", prefix),
                codes::DUPLICATE,
                format!("Schema '{}' is listed twice", dup),
            );
        }
    }

    if let Some(dup) = first_duplicate(selection.databases.iter().map(|d| d.name.as_str())) {
        report.error(
            "databases",
            codes::DUPLICATE,
            format!("Database '{}' is configured twice", dup),
        );
    }

    report.finish()
}

fn validate_new_database(data: &ProjectFormData) -> StepValidationResult {
    if !data.database_selection.create_new_database {
        return StepValidationResult::pass();
    }
    let mut report = ValidationReport::new();
    let Some(db) = data.new_database.as_ref() else {
        report.critical(
            "newDatabase",
            codes::REQUIRED,
            "New database configuration is missing",
        );
        return report.finish();
    };

    let engine_ok = report.require("engine", &db.engine, "Database engine");
    if engine_ok && !is_supported_engine(&db.engine) {
        report.error(
            "engine",
            codes::UNSUPPORTED,
            format!("Unsupported database engine '{}'", db.engine.trim()),
        );
    }

    if report.require("name", &db.name, "Database name") {
        if let Err(msg) = validate_database_name(&db.engine, &db.name) {
            report.error("name", codes::INVALID_FORMAT, msg);
        }
    }

    if db.size_gb == 0 {
        report.error("sizeGb", codes::REQUIRED, "Database size is required");
    } else if db.size_gb > MAX_DATABASE_SIZE_GB {
        report.error(
            "sizeGb",
            codes::OUT_OF_RANGE,
            format!("Database size cannot exceed {} GB", MAX_DATABASE_SIZE_GB),
        );
    }

    report.require("region", &db.region, "Region");

    if is_blank(&db.version) {
        report.warning(
            "version",
            codes::RECOMMENDED,
            "No engine version selected; the platform default will be used",
        );
    }

    report.finish()
}

fn validate_environments(data: &ProjectFormData) -> StepValidationResult {
    let envs = &data.environments.environments;
    let mut report = ValidationReport::new();

    if envs.is_empty() {
        report.error(
            "environments",
            codes::MIN_ITEMS,
            "Select at least one environment",
        );
    }

    for (i, env) in envs.iter().enumerate() {
        report.require(
            &format!("environments[{}].name", i),
            &env.name,
            "Environment name",
        );
        if env.kind == EnvironmentKind::Production && !env.requires_approval {
            report.warning(
                format!("environments[{}].requiresApproval", i),
                codes::RECOMMENDED,
                "Production deployments should require approval",
            );
        }
    }

    if let Some(dup) = first_duplicate(envs.iter().map(|e| e.name.as_str())) {
        report.error(
            "environments",
            codes::DUPLICATE,
            format!("Environment '{}' is listed twice", dup),
        );
    }

    report.finish()
}

fn validate_database_auth(data: &ProjectFormData) -> StepValidationResult {
    let auth = &data.database_auth;
    let mut report = ValidationReport::new();

    match auth.method {
        None => report.error("method", codes::REQUIRED, "Select an authentication method"),
        Some(AuthMethod::Password) => {
            report.require("username", &auth.username, "Username");
            if report.require("password", &auth.password, "Password")
                && auth.password.chars().count() < MIN_PASSWORD_LEN
            {
                report.error(
                    "password",
                    codes::TOO_SHORT,
                    format!(
                        "Password must be at least {} characters",
                        MIN_PASSWORD_LEN
                    ),
                );
            }
        }
        Some(AuthMethod::ServiceAccount) => {
            report.require("servicePrincipal", &auth.service_principal, "Service account");
            if report.require("secretReference", &auth.secret_reference, "Secret reference")
                && !auth.secret_reference.contains("://")
            {
                report.error(
                    "secretReference",
                    codes::INVALID_FORMAT,
                    "Secret reference must be a URI such as vault://path/to/secret",
                );
            }
        }
        Some(AuthMethod::Kerberos) => {
            if report.require("servicePrincipal", &auth.service_principal, "Kerberos principal")
                && !auth.service_principal.contains('@')
            {
                report.error(
                    "servicePrincipal",
                    codes::INVALID_FORMAT,
                    "Kerberos principal must look like service/host@REALM",
                );
            }
        }
    }

    report.finish()
}

fn validate_notifications(data: &ProjectFormData) -> StepValidationResult {
    let n = &data.notifications;
    let mut report = ValidationReport::new();

    if n.email_enabled && n.recipients.is_empty() {
        report.error(
            "recipients",
            codes::MIN_ITEMS,
            "Add at least one recipient or disable email notifications",
        );
    }
    for (i, r) in n.recipients.iter().enumerate() {
        if !is_valid_email(r) {
            report.error(
                format!("recipients[{}]", i),
                codes::INVALID_EMAIL,
                format!("'{}' is not a valid email address", r.trim()),
            );
        }
    }

    if !is_blank(&n.webhook_url) {
        match parse_http_url(&n.webhook_url) {
            Ok(url) if url.scheme() == "http" => report.warning(
                "webhookUrl",
                codes::INSECURE_URL,
                "Webhook URL is not using HTTPS",
            ),
            Ok(_) => {}
            Err(msg) => report.error("webhookUrl", codes::INVALID_URL, msg),
        }
    } else if !n.email_enabled {
        report.warning(
            "notifications",
            codes::RECOMMENDED,
            "No notification channel configured",
        );
    }

    report.finish()
}

fn validate_github(data: &ProjectFormData) -> StepValidationResult {
    let gh = &data.github;
    let mut report = ValidationReport::new();

    if gh.create_repository {
        report.require("organization", &gh.organization, "GitHub organization");
        if report.require("repositoryName", &gh.repository_name, "Repository name")
            && !is_valid_repository_name(&gh.repository_name)
        {
            report.error(
                "repositoryName",
                codes::INVALID_FORMAT,
                "Repository name may contain letters, digits, '.', '_' and '-' only",
            );
        }
    } else if report.require(
        "existingRepositoryUrl",
        &gh.existing_repository_url,
        "Repository URL",
    ) {
        match parse_http_url(&gh.existing_repository_url) {
            Ok(url) => {
                let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
                if !host.contains("github") {
                    report.error(
                        "existingRepositoryUrl",
                        codes::INVALID_URL,
                        "Repository URL must point to a GitHub host",
                    );
                }
            }
            Err(msg) => report.error("existingRepositoryUrl", codes::INVALID_URL, msg),
        }
    }

    if gh.visibility == RepoVisibility::Public {
        report.warning(
            "visibility",
            codes::RECOMMENDED,
            "Public repositories are visible to everyone",
        );
    }

    report.finish()
}

fn validate_entitlements(data: &ProjectFormData) -> StepValidationResult {
    let ent = &data.entitlements;
    let mut report = ValidationReport::new();

    let owner_ok = report.require("entitlementOwner", &ent.entitlement_owner, "Entitlement owner")
        && check_owner_id(&mut report, "entitlementOwner", &ent.entitlement_owner);
    let tech_ok = report.require("technicalOwner", &ent.technical_owner, "Technical owner")
        && check_owner_id(&mut report, "technicalOwner", &ent.technical_owner);

    if owner_ok
        && tech_ok
        && ent
            .entitlement_owner
            .trim()
            .eq_ignore_ascii_case(ent.technical_owner.trim())
    {
        report.error(
            "technicalOwner",
            codes::OWNERS_MUST_DIFFER,
            "Entitlement owner and technical owner must be different people",
        );
    }

    for (i, approver) in ent.approvers.iter().enumerate() {
        check_owner_id(&mut report, &format!("approvers[{}]", i), approver);
    }
    if let Some(dup) = first_duplicate(ent.approvers.iter().map(String::as_str)) {
        report.warning(
            "approvers",
            codes::DUPLICATE,
            format!("Approver '{}' is listed twice", dup),
        );
    }

    report.finish()
}

fn check_owner_id(report: &mut ValidationReport, field: &str, value: &str) -> bool {
    if is_valid_owner_id(value) {
        return true;
    }
    report.error(
        field,
        codes::INVALID_OWNER_ID,
        format!(
            "'{}' is not a valid owner id (expected one letter and six digits, e.g. A123456)",
            value.trim()
        ),
    );
    false
}

fn validate_review(data: &ProjectFormData) -> StepValidationResult {
    let review = &data.review;
    let mut report = ValidationReport::new();

    if !review.confirmed {
        report.error(
            "confirmed",
            codes::NOT_CONFIRMED,
            "Confirm the configuration before creating the project",
        );
    }
    if review.comments.chars().count() > MAX_COMMENTS_LEN {
        report.error(
            "comments",
            codes::TOO_LONG,
            format!("Comments cannot exceed {} characters", MAX_COMMENTS_LEN),
        );
    }

    report.finish()
}

/// Fully valid sample used by tests and the smoke runner.
pub fn sample_form_data() -> ProjectFormData {
    ProjectFormData {
        general_info: GeneralInfo {
            name: "My Project".to_string(),
            description: "Customer analytics pipeline".to_string(),
            tags: vec!["analytics".to_string()],
        },
        setup_type: SetupType {
            setup_type: Some(SetupKind::Standard),
            ..SetupType::default()
        },
        database_selection: DatabaseSelection {
            create_new_database: false,
            databases: vec![DatabaseConfig {
                name: "customers".to_string(),
                engine: "postgres".to_string(),
                entitlement_bases: vec!["CUST_READ".to_string()],
                schemas: vec!["public".to_string()],
            }],
        },
        new_database: None,
        environments: Environments {
            environments: vec![
                Environment {
                    name: "dev".to_string(),
                    kind: EnvironmentKind::Development,
                    requires_approval: false,
                },
                Environment {
                    name: "prod".to_string(),
                    kind: EnvironmentKind::Production,
                    requires_approval: true,
                },
            ],
        },
        database_auth: DatabaseAuth {
            method: Some(AuthMethod::ServiceAccount),
            service_principal: "svc-analytics".to_string(),
            secret_reference: "vault://kv/analytics/db".to_string(),
            ..DatabaseAuth::default()
        },
        notifications: Notifications {
            email_enabled: true,
            recipients: vec!["team@example.com".to_string()],
            webhook_url: String::new(),
            events: vec!["created".to_string()],
        },
        github: Github {
            create_repository: true,
            organization: "acme".to_string(),
            repository_name: "customer-analytics".to_string(),
            ..Github::default()
        },
        entitlements: Entitlements {
            entitlement_owner: "A123456".to_string(),
            technical_owner: "B654321".to_string(),
            approvers: Vec::new(),
        },
        review: Review {
            confirmed: true,
            comments: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(step: ProjectStep, data: &ProjectFormData) -> StepValidationResult {
        ProjectCreationFlow::validator(step)(data)
    }

    const ALL_STEPS: [ProjectStep; 10] = [
        ProjectStep::GeneralInfo,
        ProjectStep::SetupType,
        ProjectStep::DatabaseSelection,
        ProjectStep::NewDatabase,
        ProjectStep::Environments,
        ProjectStep::DatabaseAuth,
        ProjectStep::Notifications,
        ProjectStep::Github,
        ProjectStep::Entitlements,
        ProjectStep::Review,
    ];

    #[test]
    fn registry_lists_every_step_once_in_order() {
        let ids: Vec<ProjectStep> = ProjectCreationFlow::steps().iter().map(|s| s.id).collect();
        assert_eq!(ids, ALL_STEPS.to_vec());
        let conditional: Vec<ProjectStep> = ProjectCreationFlow::steps()
            .iter()
            .filter(|s| s.is_conditional())
            .map(|s| s.id)
            .collect();
        assert_eq!(conditional, vec![ProjectStep::NewDatabase]);
    }

    #[test]
    fn sample_data_passes_every_step() {
        let data = sample_form_data();
        for step in ALL_STEPS {
            let result = validate(step, &data);
            assert!(result.valid, "{} failed: {:?}", step, result.errors);
        }
    }

    #[test]
    fn empty_name_is_reported_on_name_field() {
        let mut data = ProjectFormData::default();
        let result = validate(ProjectStep::GeneralInfo, &data);
        assert!(!result.valid);
        assert!(result.has_error_on("name"));

        data.general_info.name = "My Project".to_string();
        let result = validate(ProjectStep::GeneralInfo, &data);
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.has_warning_on("description"));
    }

    #[test]
    fn long_or_malformed_names_are_rejected() {
        let mut data = sample_form_data();
        data.general_info.name = "x".repeat(MAX_NAME_LEN + 1);
        let result = validate(ProjectStep::GeneralInfo, &data);
        assert_eq!(result.errors[0].code, codes::TOO_LONG);

        data.general_info.name = "!bad".to_string();
        let result = validate(ProjectStep::GeneralInfo, &data);
        assert_eq!(result.errors[0].code, codes::INVALID_FORMAT);
    }

    #[test]
    fn migration_requires_source_project() {
        let mut data = sample_form_data();
        data.setup_type.setup_type = Some(SetupKind::Migration);
        assert!(validate(ProjectStep::SetupType, &data).has_error_on("sourceProject"));
        data.setup_type.source_project = "legacy-crm".to_string();
        assert!(validate(ProjectStep::SetupType, &data).valid);
    }

    #[test]
    fn database_selection_needs_a_database_unless_creating_one() {
        let mut data = sample_form_data();
        data.database_selection.databases.clear();
        let result = validate(ProjectStep::DatabaseSelection, &data);
        assert!(result.has_error_on("databases"));
        assert_eq!(result.errors[0].code, codes::MIN_ITEMS);

        data.database_selection.create_new_database = true;
        assert!(validate(ProjectStep::DatabaseSelection, &data).valid);
    }

    #[test]
    fn database_configs_are_checked_individually() {
        let mut data = sample_form_data();
        data.database_selection.databases.push(DatabaseConfig {
            name: "Customers".to_string(),
            engine: "db2".to_string(),
            entitlement_bases: vec![" ".to_string()],
            schemas: vec!["ok".to_string(), "bad-schema".to_string(), "OK".to_string()],
        });
        let result = validate(ProjectStep::DatabaseSelection, &data);
        assert!(result.has_error_on("databases[1].engine"));
        assert!(result.has_error_on("databases[1].entitlementBases"));
        assert!(result.has_error_on("databases[1].schemas[1]"));
        assert!(result.has_error_on("databases[1].schemas"));
        // "customers" vs "Customers"
        assert!(result.has_error_on("databases"));
    }

    #[test]
    fn hidden_new_database_step_passes_without_section() {
        let data = sample_form_data();
        assert!(!data.database_selection.create_new_database);
        let result = validate(ProjectStep::NewDatabase, &data);
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn visible_new_database_step_checks_fields() {
        let mut data = sample_form_data();
        data.database_selection.create_new_database = true;
        ProjectCreationFlow::normalize(&mut data);
        let result = validate(ProjectStep::NewDatabase, &data);
        assert!(result.has_error_on("name"));
        assert!(result.has_error_on("sizeGb"));
        assert!(result.has_error_on("region"));

        let db = data.new_database.as_mut().unwrap();
        db.name = "analytics".to_string();
        db.size_gb = MAX_DATABASE_SIZE_GB + 1;
        db.region = "eu-west-1".to_string();
        let result = validate(ProjectStep::NewDatabase, &data);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, codes::OUT_OF_RANGE);
    }

    #[test]
    fn new_database_section_missing_while_visible_is_critical() {
        let mut data = sample_form_data();
        data.database_selection.create_new_database = true;
        let result = validate(ProjectStep::NewDatabase, &data);
        assert!(!result.valid);
        assert_eq!(
            result.errors[0].severity,
            crate::models::validation::Severity::Critical
        );
    }

    #[test]
    fn normalize_keeps_new_database_in_step_with_toggle() {
        let mut data = sample_form_data();
        data.database_selection.create_new_database = true;
        ProjectCreationFlow::normalize(&mut data);
        assert!(data.new_database.is_some());
        data.database_selection.create_new_database = false;
        ProjectCreationFlow::normalize(&mut data);
        assert!(data.new_database.is_none());
    }

    #[test]
    fn environments_reject_duplicates_and_warn_on_unapproved_prod() {
        let mut data = sample_form_data();
        data.environments.environments[1].requires_approval = false;
        let result = validate(ProjectStep::Environments, &data);
        assert!(result.valid);
        assert!(result.has_warning_on("environments[1].requiresApproval"));

        data.environments.environments.push(Environment {
            name: "DEV".to_string(),
            ..Environment::default()
        });
        assert!(validate(ProjectStep::Environments, &data).has_error_on("environments"));

        data.environments.environments.clear();
        let result = validate(ProjectStep::Environments, &data);
        assert_eq!(result.errors[0].code, codes::MIN_ITEMS);
    }

    #[test]
    fn password_auth_requires_strong_password() {
        let mut data = sample_form_data();
        data.database_auth = DatabaseAuth {
            method: Some(AuthMethod::Password),
            username: "app".to_string(),
            password: "short".to_string(),
            ..DatabaseAuth::default()
        };
        let result = validate(ProjectStep::DatabaseAuth, &data);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, codes::TOO_SHORT);

        data.database_auth.password = "correct-horse-battery".to_string();
        assert!(validate(ProjectStep::DatabaseAuth, &data).valid);
    }

    #[test]
    fn service_account_needs_uri_secret_reference() {
        let mut data = sample_form_data();
        data.database_auth.secret_reference = "plain-secret".to_string();
        assert!(validate(ProjectStep::DatabaseAuth, &data).has_error_on("secretReference"));
    }

    #[test]
    fn kerberos_principal_needs_realm() {
        let mut data = sample_form_data();
        data.database_auth = DatabaseAuth {
            method: Some(AuthMethod::Kerberos),
            service_principal: "svc/host".to_string(),
            ..DatabaseAuth::default()
        };
        assert!(validate(ProjectStep::DatabaseAuth, &data).has_error_on("servicePrincipal"));
        data.database_auth.service_principal = "svc/host@CORP.EXAMPLE".to_string();
        assert!(validate(ProjectStep::DatabaseAuth, &data).valid);
    }

    #[test]
    fn missing_auth_method_is_required() {
        let data = ProjectFormData::default();
        assert!(validate(ProjectStep::DatabaseAuth, &data).has_error_on("method"));
    }

    #[test]
    fn notifications_validate_recipients_and_webhook() {
        let mut data = sample_form_data();
        data.notifications.recipients.push("nope".to_string());
        data.notifications.webhook_url = "http://hooks.example.com/x".to_string();
        let result = validate(ProjectStep::Notifications, &data);
        assert!(result.has_error_on("recipients[1]"));
        assert!(result.has_warning_on("webhookUrl"));

        data.notifications.recipients.clear();
        data.notifications.webhook_url = "hooks".to_string();
        let result = validate(ProjectStep::Notifications, &data);
        assert!(result.has_error_on("recipients"));
        assert!(result.has_error_on("webhookUrl"));
    }

    #[test]
    fn notifications_without_channel_only_warns() {
        let mut data = sample_form_data();
        data.notifications = Notifications::default();
        let result = validate(ProjectStep::Notifications, &data);
        assert!(result.valid);
        assert!(result.has_warning_on("notifications"));
    }

    #[test]
    fn github_existing_repository_must_be_github_url() {
        let mut data = sample_form_data();
        data.github.create_repository = false;
        assert!(validate(ProjectStep::Github, &data).has_error_on("existingRepositoryUrl"));

        data.github.existing_repository_url = "https://gitlab.com/acme/x".to_string();
        assert!(validate(ProjectStep::Github, &data).has_error_on("existingRepositoryUrl"));

        data.github.existing_repository_url = "https://github.com/acme/x".to_string();
        assert!(validate(ProjectStep::Github, &data).valid);
    }

    #[test]
    fn github_new_repository_name_format() {
        let mut data = sample_form_data();
        data.github.repository_name = "bad name".to_string();
        assert!(validate(ProjectStep::Github, &data).has_error_on("repositoryName"));
    }

    #[test]
    fn entitlement_owners_must_differ() {
        let mut data = sample_form_data();
        data.entitlements.technical_owner = "a123456".to_string();
        let result = validate(ProjectStep::Entitlements, &data);
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, codes::OWNERS_MUST_DIFFER);
        assert_eq!(result.errors[0].field, "technicalOwner");
    }

    #[test]
    fn entitlement_owner_ids_follow_pattern() {
        let mut data = sample_form_data();
        data.entitlements.entitlement_owner = "jdoe".to_string();
        data.entitlements.approvers = vec!["C111111".to_string(), "x".to_string()];
        let result = validate(ProjectStep::Entitlements, &data);
        assert!(result.has_error_on("entitlementOwner"));
        assert!(result.has_error_on("approvers[1]"));
        assert!(!result.has_error_on("technicalOwner"));
    }

    #[test]
    fn review_requires_confirmation() {
        let mut data = sample_form_data();
        data.review.confirmed = false;
        let result = validate(ProjectStep::Review, &data);
        assert_eq!(result.errors[0].code, codes::NOT_CONFIRMED);
    }

    #[test]
    fn validators_are_deterministic() {
        let mut data = sample_form_data();
        data.entitlements.technical_owner = "bad".to_string();
        for step in ALL_STEPS {
            assert_eq!(validate(step, &data), validate(step, &data));
        }
    }

    #[test]
    fn partial_section_json_fills_defaults() {
        let info: GeneralInfo = serde_json::from_value(json!({ "name": "X" })).unwrap();
        assert_eq!(info.name, "X");
        assert!(info.tags.is_empty());
        let gh: Github = serde_json::from_value(json!({})).unwrap();
        assert!(gh.create_repository);
    }

    #[test]
    fn step_display_matches_serde_name() {
        for step in ALL_STEPS {
            assert_eq!(
                serde_json::to_value(step).unwrap(),
                serde_json::Value::String(step.to_string())
            );
        }
    }

    #[test]
    fn summary_omits_credentials() {
        let mut data = sample_form_data();
        data.database_auth.password = "super-secret-password".to_string();
        let summary = ProjectCreationFlow::summarize(&data);
        assert_eq!(summary["name"], "My Project");
        assert_eq!(summary["repository"], "acme/customer-analytics");
        assert!(!summary.to_string().contains("super-secret-password"));
    }
}
