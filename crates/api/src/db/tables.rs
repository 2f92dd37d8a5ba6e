//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    DisplayName,
    AvatarUrl,
    PasswordHash,
    PasswordSalt,
    EmailVerified,
    CreatedAt,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum EmailVerificationCodes {
    Table,
    Id,
    UserId,
    CodeHash,
    Attempts,
    ExpiresAt,
    UsedAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum Projects {
    Table,
    Id,
    Name,
    Description,
    Status,
    Color,
    DueDate,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum ProjectMembers {
    Table,
    ProjectId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(Iden)]
pub enum ProjectInvites {
    Table,
    Id,
    ProjectId,
    Email,
    Role,
    TokenHash,
    Status,
    InvitedBy,
    CreatedAt,
    ExpiresAt,
}

#[derive(Iden)]
pub enum Tasks {
    Table,
    Id,
    ProjectId,
    Title,
    Description,
    Status,
    Priority,
    AssigneeId,
    DueDate,
    Position,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}

#[derive(Iden)]
pub enum Activities {
    Table,
    Id,
    ProjectId,
    TaskId,
    UserId,
    Action,
    Details,
    CreatedAt,
}

#[derive(Iden)]
pub enum Documents {
    Table,
    Id,
    ProjectId,
    TaskId,
    Name,
    ContentType,
    SizeBytes,
    StorageKey,
    UploadedBy,
    CreatedAt,
}
