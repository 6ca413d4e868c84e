use crate::models::{PaymentLink, QuotationKind, Voucher};
use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for voucher-service");

        // One link per voucher and quotation
        let link_pair_index = IndexModel::builder()
            .keys(doc! { "voucher_id": 1, "quotation_type": 1, "quotation_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("voucher_quotation_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.payment_links()
            .create_index(link_pair_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create unique link index: {}", e);
                AppError::from(e)
            })?;

        let link_quotation_index = IndexModel::builder()
            .keys(doc! { "quotation_type": 1, "quotation_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("quotation_lookup".to_string())
                    .build(),
            )
            .build();
        self.payment_links()
            .create_index(link_quotation_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create link quotation index: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created indexes on payment_links");

        let voucher_no_index = IndexModel::builder()
            .keys(doc! { "voucher_no": 1 })
            .options(
                IndexOptions::builder()
                    .name("voucher_no_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.vouchers()
            .create_index(voucher_no_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create voucher_no index: {}", e);
                AppError::from(e)
            })?;

        let voucher_listing_index = IndexModel::builder()
            .keys(doc! { "voucher_type": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("voucher_listing".to_string())
                    .build(),
            )
            .build();
        self.vouchers()
            .create_index(voucher_listing_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create voucher listing index: {}", e);
                AppError::from(e)
            })?;

        let voucher_available_index = IndexModel::builder()
            .keys(doc! { "fully_allocated": 1, "date": -1 })
            .options(
                IndexOptions::builder()
                    .name("voucher_available".to_string())
                    .build(),
            )
            .build();
        self.vouchers()
            .create_index(voucher_available_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create voucher availability index: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created indexes on vouchers");

        for kind in QuotationKind::ALL {
            let quotation_id_index = IndexModel::builder()
                .keys(doc! { "quotation_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("quotation_id_unique".to_string())
                        .unique(true)
                        .build(),
                )
                .build();
            self.quotations(kind)
                .create_index(quotation_id_index, None)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to create quotation_id index on {}: {}",
                        kind.collection_name(),
                        e
                    );
                    AppError::from(e)
                })?;
        }
        tracing::info!("Created indexes on quotation collections");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn vouchers(&self) -> Collection<Voucher> {
        self.db.collection("vouchers")
    }

    pub fn payment_links(&self) -> Collection<PaymentLink> {
        self.db.collection("payment_links")
    }

    /// Quotations keep variant-specific shapes, so they are handled as raw documents.
    pub fn quotations(&self, kind: QuotationKind) -> Collection<Document> {
        self.db.collection(kind.collection_name())
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
