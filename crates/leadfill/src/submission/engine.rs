use std::time::Duration;

use log::debug;
use tracing::{info_span, Instrument};

use crate::automation::{fill, find_visible, try_locate, visible_texts, AutomationSession, Key};
use crate::mapper::CanonicalField;
use crate::sanitize;

use super::config::EngineConfig;
use super::context::SubmissionContext;
use super::outcome::{AddressEntry, Confirmation, StepError, SubmissionOutcome, SubmissionReport};

/// Places one record into the target form and classifies the result.
///
/// Each step either succeeds, records a non-fatal finding on the context, or
/// stops the record with a [`StepError`]. Nothing is retried beyond the
/// locator fallback lists.
pub struct SubmissionEngine {
    config: EngineConfig,
}

impl SubmissionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub async fn submit(
        &self,
        session: &mut dyn AutomationSession,
        mut ctx: SubmissionContext<'_>,
    ) -> SubmissionReport {
        let span = info_span!(
            "submission",
            row = ctx.record.row_number,
            phone = %sanitize::redact_phone(&ctx.phone)
        );

        let outcome = match self.run_steps(session, &mut ctx).instrument(span).await {
            Ok(confirmation) => {
                ctx.confirmation = Some(confirmation);
                SubmissionOutcome::Success
            }
            Err(e) => {
                debug!("Row {} stopped: {}", ctx.record.row_number, e);
                e.into()
            }
        };

        SubmissionReport {
            outcome,
            confirmation: ctx.confirmation,
            address_entry: ctx.address_entry,
            skipped_fields: ctx.skipped_fields,
            notes: ctx.notes,
        }
    }

    async fn run_steps(
        &self,
        session: &mut dyn AutomationSession,
        ctx: &mut SubmissionContext<'_>,
    ) -> Result<Confirmation, StepError> {
        // Step 1: Batch-level pre-check, before touching the page
        if self.config.skip_repeated_phones && ctx.repeated_in_batch {
            ctx.notes
                .push("phone already attempted earlier in this batch".to_string());
            return Err(StepError::DuplicatePhone(ctx.phone.clone()));
        }

        // Step 2: Fresh form
        self.step_reload(session)
            .instrument(info_span!("reload_form"))
            .await?;

        // Step 3: Phone, with the target's duplicate check
        self.step_phone(session, ctx)
            .instrument(info_span!("duplicate_check"))
            .await?;

        // Step 4: Address
        self.step_address(session, ctx)
            .instrument(info_span!("address"))
            .await?;

        // Step 5: Complement
        self.step_complement(session, ctx)
            .instrument(info_span!("complement"))
            .await?;

        // Step 6: Owner name and e-mail
        self.step_contact(session, ctx)
            .instrument(info_span!("contact"))
            .await?;

        // Step 7: Submit and classify
        self.step_submit(session, ctx)
            .instrument(info_span!("submit"))
            .await
    }

    async fn step_reload(&self, session: &mut dyn AutomationSession) -> Result<(), StepError> {
        if !self.config.reload_per_record {
            return Ok(());
        }
        session.open(&self.config.target_url).await?;
        settle(self.config.timings.page_load()).await;
        Ok(())
    }

    async fn step_phone(
        &self,
        session: &mut dyn AutomationSession,
        ctx: &mut SubmissionContext<'_>,
    ) -> Result<(), StepError> {
        let profile = &self.config.profile;
        let Some(found) = try_locate(session, &profile.phone).await? else {
            return Err(StepError::FieldNotFound(CanonicalField::Phone));
        };
        fill(session, &found, &ctx.phone).await?;
        settle(self.config.timings.field()).await;

        let messages = visible_texts(session, &profile.error_indicators).await?;
        if messages.iter().any(|m| profile.is_duplicate_message(m)) {
            ctx.notes.push("target reports the phone as registered".to_string());
            return Err(StepError::DuplicatePhone(ctx.phone.clone()));
        }
        Ok(())
    }

    async fn step_address(
        &self,
        session: &mut dyn AutomationSession,
        ctx: &mut SubmissionContext<'_>,
    ) -> Result<(), StepError> {
        let profile = &self.config.profile;
        let Some(found) = try_locate(session, &profile.address).await? else {
            ctx.skip(CanonicalField::Address);
            ctx.notes.push("address input not found".to_string());
            return Ok(());
        };

        fill(session, &found, &ctx.record.composed_address()).await?;
        settle(self.config.timings.address()).await;

        let entry = match find_visible(session, &profile.address_suggestions).await? {
            Some(suggestion) => {
                session.click(&suggestion).await?;
                AddressEntry::Suggestion
            }
            None if self.config.confirm_address_with_enter => {
                session.press_key(&found, Key::Enter).await?;
                AddressEntry::Confirmed
            }
            None => AddressEntry::Typed,
        };
        debug!("Address entered via {:?}", entry);
        ctx.address_entry = Some(entry);
        settle(self.config.timings.field()).await;
        Ok(())
    }

    async fn step_complement(
        &self,
        session: &mut dyn AutomationSession,
        ctx: &mut SubmissionContext<'_>,
    ) -> Result<(), StepError> {
        let profile = &self.config.profile;
        match try_locate(session, &profile.complement).await? {
            Some(found) => {
                let value = profile.complement_value(&ctx.record.complement);
                fill(session, &found, &value).await?;
            }
            None if !ctx.record.complement.is_empty() => {
                ctx.skip(CanonicalField::Complement);
                ctx.notes.push("complement input not found".to_string());
            }
            None => {}
        }
        Ok(())
    }

    async fn step_contact(
        &self,
        session: &mut dyn AutomationSession,
        ctx: &mut SubmissionContext<'_>,
    ) -> Result<(), StepError> {
        let profile = &self.config.profile;

        let Some(name) = try_locate(session, &profile.owner_name).await? else {
            return Err(StepError::FieldNotFound(CanonicalField::OwnerName));
        };
        fill(session, &name, &ctx.record.owner_name).await?;

        if !ctx.record.email.is_empty() {
            match try_locate(session, &profile.email).await? {
                Some(email) => fill(session, &email, &ctx.record.email).await?,
                None => {
                    ctx.skip(CanonicalField::Email);
                    ctx.notes.push("e-mail input not found".to_string());
                }
            }
        }
        Ok(())
    }

    async fn step_submit(
        &self,
        session: &mut dyn AutomationSession,
        ctx: &mut SubmissionContext<'_>,
    ) -> Result<Confirmation, StepError> {
        let profile = &self.config.profile;
        let Some(submit) = try_locate(session, &profile.submit).await? else {
            return Err(StepError::SubmitControlMissing);
        };
        session.click(&submit).await?;
        settle(self.config.timings.submit()).await;

        if find_visible(session, &profile.success_indicators)
            .await?
            .is_some()
        {
            return Ok(Confirmation::Explicit);
        }

        if find_visible(session, &profile.error_indicators)
            .await?
            .is_some()
        {
            let messages = visible_texts(session, &profile.error_indicators).await?;
            if messages.iter().any(|m| profile.is_duplicate_message(m)) {
                return Err(StepError::DuplicatePhone(ctx.phone.clone()));
            }
            let mut unique: Vec<String> = Vec::new();
            for message in messages {
                if !unique.contains(&message) {
                    unique.push(message);
                }
            }
            let reason = if unique.is_empty() {
                "error indicator visible".to_string()
            } else {
                unique.join("; ")
            };
            return Err(StepError::Rejected(reason));
        }

        // No confirmation and no error: counted as success.
        ctx.notes.push("no confirmation shown after submit".to_string());
        Ok(Confirmation::Implicit)
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
