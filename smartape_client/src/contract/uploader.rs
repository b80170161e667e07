use crate::chunker::Chunk;
use crate::error::{Result, SmartApeError, TransportError};
use crate::ledger::{FileAppendTransaction, FileCreateTransaction, FileId, Hbar, LedgerClient};
use crate::progress::{ProgressReporter, Stage};
use log::{debug, info, warn};

/// Stages bytecode in a ledger file: one create, then ordered appends
pub struct FileUploader<'a> {
    ledger: &'a dyn LedgerClient,
    keys: Vec<String>,
    max_fee: Hbar,
}

impl<'a> FileUploader<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, keys: Vec<String>, max_fee: Hbar) -> Self {
        Self {
            ledger,
            keys,
            max_fee,
        }
    }

    /// Create the file holding the first chunk
    pub async fn create_initial(&self, chunk: &Chunk) -> Result<FileId> {
        let tx = FileCreateTransaction {
            contents: chunk.data.clone(),
            keys: self.keys.clone(),
            max_transaction_fee: self.max_fee,
        };
        let receipt = self
            .ledger
            .create_file(&tx)
            .await?
            .ensure_success("FileCreate")?;
        let file_id = receipt.file_id.ok_or_else(|| {
            TransportError::Malformed("FileCreate receipt carries no file id".to_string())
        })?;
        debug!("created bytecode file {}", file_id);
        Ok(file_id)
    }

    /// Append one chunk and wait for it to be confirmed
    pub async fn append_next(&self, file_id: FileId, chunk: &Chunk) -> Result<()> {
        let tx = FileAppendTransaction {
            file_id,
            contents: chunk.data.clone(),
            max_transaction_fee: self.max_fee,
        };
        self.ledger
            .append_file(&tx)
            .await?
            .ensure_success("FileAppend")?;
        debug!("appended chunk {} to {}", chunk.index, file_id);
        Ok(())
    }

    /// Upload every chunk in order, reporting after each confirmed step
    pub async fn upload(&self, chunks: &[Chunk], progress: &ProgressReporter<'_>) -> Result<FileId> {
        let total = chunks.len();
        let (first, rest) = chunks.split_first().ok_or(SmartApeError::EmptyBytecode)?;

        progress.step(Stage::Upload, 0, total, loading_message(0, total));
        let file_id = self.create_initial(first).await?;
        progress.step(Stage::Upload, 1, total, loading_message(1, total));

        for (i, chunk) in rest.iter().enumerate() {
            if let Err(e) = self.append_next(file_id, chunk).await {
                warn!(
                    "upload to {} stopped after {} of {} chunks; the partial file is left on the ledger",
                    file_id,
                    i + 1,
                    total
                );
                return Err(e);
            }
            let done = i + 2;
            progress.step(Stage::Upload, done, total, loading_message(done, total));
        }

        info!("uploaded {} chunks to {}", total, file_id);
        Ok(file_id)
    }
}

fn loading_message(done: usize, total: usize) -> String {
    format!("Loading smart contract (chunk {} of {}).", done, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::split_into_chunks;
    use crate::ledger::memory::LedgerOperation;
    use crate::ledger::MemoryLedger;
    use crate::progress::testing::Recorder;

    #[tokio::test]
    async fn test_upload_reassembles_blob() {
        let ledger = MemoryLedger::new();
        let uploader = FileUploader::new(&ledger, vec![], Hbar::from_hbars(2));
        let blob: Vec<u8> = (0..3000u32).map(|i| b"0123456789abcdef"[(i % 16) as usize]).collect();
        let chunks = split_into_chunks(&blob, 1024).unwrap();

        let recorder = Recorder::default();
        let reporter = ProgressReporter::with_range(&recorder, 0.0, 0.9);
        let file_id = uploader.upload(&chunks, &reporter).await.unwrap();

        assert_eq!(ledger.file_contents(&file_id).unwrap(), blob);

        let events = recorder.0.lock();
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Loading smart contract (chunk 0 of 3).",
                "Loading smart contract (chunk 1 of 3).",
                "Loading smart contract (chunk 2 of 3).",
                "Loading smart contract (chunk 3 of 3).",
            ]
        );
        assert_eq!(events.last().unwrap().fraction, 0.9);
    }

    #[tokio::test]
    async fn test_appends_follow_create_in_order() {
        let ledger = MemoryLedger::new();
        let uploader = FileUploader::new(&ledger, vec![], Hbar::from_hbars(2));
        let chunks = split_into_chunks(&[1u8; 10], 3).unwrap();
        let recorder = Recorder::default();
        uploader
            .upload(&chunks, &ProgressReporter::new(&recorder))
            .await
            .unwrap();

        let ops: Vec<LedgerOperation> = ledger.calls().iter().map(|c| c.operation).collect();
        assert_eq!(
            ops,
            vec![
                LedgerOperation::FileCreate,
                LedgerOperation::FileAppend,
                LedgerOperation::FileAppend,
                LedgerOperation::FileAppend,
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_append_stops_upload() {
        let ledger = MemoryLedger::new();
        ledger.fail_on(LedgerOperation::FileAppend, 1, "INSUFFICIENT_TX_FEE");
        let uploader = FileUploader::new(&ledger, vec![], Hbar::from_hbars(2));
        let chunks = split_into_chunks(&[1u8; 10], 3).unwrap();
        let recorder = Recorder::default();

        let err = uploader
            .upload(&chunks, &ProgressReporter::new(&recorder))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SmartApeError::Transport(TransportError::Rejected { ref status, .. }) if status == "INSUFFICIENT_TX_FEE"
        ));
        assert_eq!(ledger.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_no_chunks_is_empty_bytecode() {
        let ledger = MemoryLedger::new();
        let uploader = FileUploader::new(&ledger, vec![], Hbar::from_hbars(2));
        let recorder = Recorder::default();
        assert!(matches!(
            uploader.upload(&[], &ProgressReporter::new(&recorder)).await,
            Err(SmartApeError::EmptyBytecode)
        ));
        assert!(ledger.calls().is_empty());
    }
}
