//! Read model database schema.

/// SQL to create the request projection table.
pub const CREATE_REQUEST_PROJECTIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS request_projections (
    request_id       UUID PRIMARY KEY,
    tenant_id        UUID NOT NULL,
    requester_id     UUID NOT NULL,
    project_id       UUID NOT NULL,
    vm_name          VARCHAR(255) NOT NULL,
    size             VARCHAR(64) NOT NULL,
    justification    TEXT NOT NULL,
    status           VARCHAR(32) NOT NULL,
    approved_by      UUID,
    rejection_reason TEXT,
    machine_id       VARCHAR(255),
    ip_address       VARCHAR(64),
    hostname         VARCHAR(255),
    requested_at     TIMESTAMPTZ NOT NULL,
    decided_at       TIMESTAMPTZ,
    provisioned_at   TIMESTAMPTZ,
    version          BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_request_projections_tenant_status
    ON request_projections (tenant_id, status);

CREATE INDEX IF NOT EXISTS idx_request_projections_tenant_requester
    ON request_projections (tenant_id, requester_id);
";
