//! Organizations, clients and children.

use super::{db_error, like_pattern, Database};
use crate::models::{
    Child, Client, CreateChild, CreateClient, CreateOrganization, ListChildrenFilter,
    ListClientsFilter, ListOrganizationsFilter, Organization, Page, UpdateChild, UpdateClient,
    UpdateOrganization,
};
use crate::services::metrics::{record_debtor_flag_change, DB_QUERY_DURATION};
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

const ORGANIZATION_COLUMNS: &str = "organization_id, name, kind, contact_name, phone, email, address, is_active, created_utc, updated_utc";
const CLIENT_COLUMNS: &str =
    "client_id, organization_id, name, email, phone, notes, is_debtor, created_utc, updated_utc";
const CHILD_COLUMNS: &str =
    "child_id, client_id, organization_id, name, grade, notes, created_utc, updated_utc";

impl Database {
    // =========================================================================
    // Organization Operations
    // =========================================================================

    #[instrument(skip(self, input))]
    pub async fn create_organization(
        &self,
        input: &CreateOrganization,
    ) -> Result<Organization, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_organization"])
            .start_timer();

        let organization = sqlx::query_as::<_, Organization>(&format!(
            r#"
            INSERT INTO organizations (organization_id, name, kind, contact_name, phone, email, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(input.kind.as_str())
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create organization", e))?;

        timer.observe_duration();
        info!(organization_id = %organization.organization_id, name = %organization.name, "Organization created");

        Ok(organization)
    }

    #[instrument(skip(self))]
    pub async fn get_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE organization_id = $1"
        ))
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get organization", e))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_organizations(
        &self,
        filter: &ListOrganizationsFilter,
        page: Page,
    ) -> Result<Vec<Organization>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_organizations"])
            .start_timer();

        let organizations = sqlx::query_as::<_, Organization>(&format!(
            r#"
            SELECT {ORGANIZATION_COLUMNS}
            FROM organizations
            WHERE ($1::bool = TRUE OR is_active = TRUE)
              AND ($2::text IS NULL OR name ILIKE $2 OR contact_name ILIKE $2)
              AND ($3::text IS NULL OR kind = $3)
            ORDER BY name, organization_id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.include_inactive)
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list organizations", e))?;

        timer.observe_duration();

        Ok(organizations)
    }

    #[instrument(skip(self, input))]
    pub async fn update_organization(
        &self,
        organization_id: Uuid,
        input: &UpdateOrganization,
    ) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(&format!(
            r#"
            UPDATE organizations
            SET name = COALESCE($2, name),
                kind = COALESCE($3, kind),
                contact_name = COALESCE($4, contact_name),
                phone = COALESCE($5, phone),
                email = COALESCE($6, email),
                address = COALESCE($7, address)
            WHERE organization_id = $1
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        ))
        .bind(organization_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.kind.map(|k| k.as_str()))
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update organization", e))
    }

    /// Organizations are referenced by clients, bundles and purchases, so
    /// they are switched off instead of deleted.
    #[instrument(skip(self))]
    pub async fn deactivate_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError> {
        let organization = sqlx::query_as::<_, Organization>(&format!(
            r#"
            UPDATE organizations SET is_active = FALSE
            WHERE organization_id = $1
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        ))
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("deactivate organization", e))?;

        if organization.is_some() {
            info!(organization_id = %organization_id, "Organization deactivated");
        }

        Ok(organization)
    }

    // =========================================================================
    // Client Operations
    // =========================================================================

    #[instrument(skip(self, input))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (client_id, organization_id, name, email, phone, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create client", e))?;

        timer.observe_duration();
        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    #[instrument(skip(self))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = $1"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get client", e))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_clients(
        &self,
        filter: &ListClientsFilter,
        page: Page,
    ) -> Result<Vec<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let clients = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS}
            FROM clients
            WHERE ($1::uuid IS NULL OR organization_id = $1)
              AND ($2::bool = FALSE OR is_debtor = TRUE)
              AND ($3::text IS NULL OR name ILIKE $3 OR email ILIKE $3 OR phone ILIKE $3)
            ORDER BY name, client_id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.organization_id)
        .bind(filter.debtors_only)
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list clients", e))?;

        timer.observe_duration();

        Ok(clients)
    }

    #[instrument(skip(self, input))]
    pub async fn update_client(
        &self,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET organization_id = COALESCE($2, organization_id),
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                notes = COALESCE($6, notes)
            WHERE client_id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(client_id)
        .bind(input.organization_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update client", e))
    }

    /// Delete a client that never bought anything. Returns `false` when no
    /// such client exists.
    #[instrument(skip(self))]
    pub async fn delete_client(&self, client_id: Uuid) -> Result<bool, AppError> {
        let has_purchases: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM purchases WHERE client_id = $1)")
                .bind(client_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("check client purchases", e))?;

        if has_purchases {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Client has purchases and cannot be deleted"
            )));
        }

        let result = sqlx::query("DELETE FROM clients WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete client", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the debtor flag. Writes only when the value changes, so repeated
    /// balance reads are harmless. Returns whether a row changed.
    #[instrument(skip(self))]
    pub async fn set_client_debtor(&self, client_id: Uuid, is_debtor: bool) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE clients SET is_debtor = $2
            WHERE client_id = $1 AND is_debtor IS DISTINCT FROM $2
            "#,
        )
        .bind(client_id)
        .bind(is_debtor)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update debtor flag", e))?;

        let changed = result.rows_affected() > 0;
        if changed {
            record_debtor_flag_change(is_debtor);
            info!(client_id = %client_id, is_debtor = is_debtor, "Debtor flag changed");
        }

        Ok(changed)
    }

    #[instrument(skip(self))]
    pub async fn list_debtors(&self, page: Page) -> Result<Vec<Client>, AppError> {
        self.list_clients(
            &ListClientsFilter {
                debtors_only: true,
                ..Default::default()
            },
            page,
        )
        .await
    }

    // =========================================================================
    // Child Operations
    // =========================================================================

    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub async fn create_child(&self, input: &CreateChild) -> Result<Child, AppError> {
        let child = sqlx::query_as::<_, Child>(&format!(
            r#"
            INSERT INTO children (child_id, client_id, organization_id, name, grade, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CHILD_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.client_id)
        .bind(input.organization_id)
        .bind(input.name.trim())
        .bind(&input.grade)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create child", e))?;

        info!(child_id = %child.child_id, "Child created");

        Ok(child)
    }

    #[instrument(skip(self))]
    pub async fn get_child(&self, child_id: Uuid) -> Result<Option<Child>, AppError> {
        sqlx::query_as::<_, Child>(&format!(
            "SELECT {CHILD_COLUMNS} FROM children WHERE child_id = $1"
        ))
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get child", e))
    }

    #[instrument(skip(self, filter))]
    pub async fn list_children(
        &self,
        filter: &ListChildrenFilter,
        page: Page,
    ) -> Result<Vec<Child>, AppError> {
        sqlx::query_as::<_, Child>(&format!(
            r#"
            SELECT {CHILD_COLUMNS}
            FROM children
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR organization_id = $2)
            ORDER BY name, child_id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.client_id)
        .bind(filter.organization_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list children", e))
    }

    #[instrument(skip(self, input))]
    pub async fn update_child(
        &self,
        child_id: Uuid,
        input: &UpdateChild,
    ) -> Result<Option<Child>, AppError> {
        sqlx::query_as::<_, Child>(&format!(
            r#"
            UPDATE children
            SET organization_id = COALESCE($2, organization_id),
                name = COALESCE($3, name),
                grade = COALESCE($4, grade),
                notes = COALESCE($5, notes)
            WHERE child_id = $1
            RETURNING {CHILD_COLUMNS}
            "#
        ))
        .bind(child_id)
        .bind(input.organization_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.grade)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update child", e))
    }

    /// Purchases keep their history; their `child_id` is nulled by the FK.
    #[instrument(skip(self))]
    pub async fn delete_child(&self, child_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM children WHERE child_id = $1")
            .bind(child_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete child", e))?;

        Ok(result.rows_affected() > 0)
    }
}
