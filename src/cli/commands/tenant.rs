use anyhow::{bail, Context};
use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::database::models::Tenant;
use crate::services::tenant_service::{CreateTenantInput, TenantService};

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all tenants")]
    List,

    #[command(about = "Show one tenant")]
    Show { slug: String },

    #[command(about = "Provision a new tenant")]
    Create {
        #[arg(long)]
        business_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "general")]
        trade: String,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        owner_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },

    #[command(about = "Delete a tenant and drop its schema")]
    Delete {
        slug: String,
        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

pub async fn run(cmd: TenantCommands, format: OutputFormat) -> anyhow::Result<()> {
    let service = TenantService::new().await.context("connecting to database")?;

    match cmd {
        TenantCommands::List => {
            let tenants = service.list().await?;
            match format {
                OutputFormat::Json => {
                    let rows: Vec<_> = tenants.iter().map(Tenant::summary).collect();
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                }
                OutputFormat::Text => {
                    if tenants.is_empty() {
                        println!("No tenants");
                    }
                    for t in tenants {
                        println!(
                            "{:<24} {:<32} {:<14} {}",
                            t.slug, t.business_name, t.trade_type, t.subscription_status
                        );
                    }
                }
            }
        }

        TenantCommands::Show { slug } => {
            let Some(tenant) = service.get_by_slug(&slug).await? else {
                bail!("No tenant with slug '{}'", slug);
            };
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&tenant)?)
                }
                OutputFormat::Text => {
                    println!("Slug:        {}", tenant.slug);
                    println!("Business:    {}", tenant.business_name);
                    println!("Trade:       {}", tenant.trade_type);
                    println!("Owner email: {}", tenant.owner_email);
                    println!("Schema:      {}", tenant.schema_name);
                    println!(
                        "Status:      {} ({})",
                        tenant.subscription_status, tenant.subscription_tier
                    );
                    if let Some(ends) = tenant.trial_ends_at {
                        println!("Trial ends:  {}", ends);
                    }
                    println!("Verified:    {}", tenant.email_verified);
                    println!("Created:     {}", tenant.created_at);
                }
            }
        }

        TenantCommands::Create {
            business_name,
            email,
            trade,
            slug,
            owner_name,
            phone,
        } => {
            let tenant = service
                .create_tenant(CreateTenantInput {
                    slug,
                    business_name,
                    trade_type: trade,
                    owner_email: email.to_lowercase(),
                    owner_name,
                    phone,
                })
                .await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tenant)?),
                OutputFormat::Text => {
                    println!("Created tenant '{}' ({})", tenant.slug, tenant.schema_name)
                }
            }
        }

        TenantCommands::Delete { slug, yes } => {
            if !yes {
                bail!("Deleting a tenant drops its schema and all data; re-run with --yes");
            }
            service.delete_tenant(&slug).await?;
            match format {
                OutputFormat::Json => println!("{}", json!({ "deleted": slug })),
                OutputFormat::Text => println!("Deleted tenant '{}'", slug),
            }
        }
    }

    Ok(())
}
