use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::{CheckoutOutcome, CheckoutPlan, Migration};
use crate::artifacts::checkout::strategy::{CheckoutStrategy, SubmoduleRecurse};
use crate::artifacts::core::cancellation::CancellationToken;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::ref_target::RefTarget;
use crate::errors::Result;

impl Repository {
    /// Plan checking out `target` (a commit, tag or tree) over HEAD's tree
    ///
    /// Submodules only get their directory; use
    /// [`Repository::checkout_with_submodules`] to recurse into them.
    pub fn checkout(
        &self,
        target: &ObjectId,
        strategy: CheckoutStrategy,
        cancel: &CancellationToken,
    ) -> Result<CheckoutPlan<'_>> {
        self.checkout_with_submodules(target, strategy, SubmoduleRecurse::default(), cancel)
    }

    pub fn checkout_with_submodules(
        &self,
        target: &ObjectId,
        strategy: CheckoutStrategy,
        submodules: SubmoduleRecurse,
        cancel: &CancellationToken,
    ) -> Result<CheckoutPlan<'_>> {
        let head = self.refs().read_head()?;
        Migration::plan(self, head.as_ref(), target, strategy, submodules, cancel)
    }

    /// Check out a branch's commit, then attach HEAD to the branch
    ///
    /// `name` is a short branch name or a full `refs/...` name.
    pub fn switch_to(
        &self,
        name: &str,
        strategy: CheckoutStrategy,
        cancel: &CancellationToken,
    ) -> Result<CheckoutOutcome> {
        let branch = match name.starts_with("refs/") {
            true => RefName::try_parse(name)?,
            false => RefName::branch(name)?,
        };
        let target = self.refs().resolve(branch.as_str())?;

        let outcome = self.checkout(&target, strategy, cancel)?.apply(cancel)?;
        self.refs().set_head(RefTarget::Symbolic(branch.clone()))?;

        tracing::info!(branch = %branch.short_name(), %target, "switched branch");
        Ok(outcome)
    }

    /// Check out `target` and detach HEAD at it
    pub fn detach_to(
        &self,
        target: &ObjectId,
        strategy: CheckoutStrategy,
        cancel: &CancellationToken,
    ) -> Result<CheckoutOutcome> {
        let outcome = self.checkout(target, strategy, cancel)?.apply(cancel)?;
        self.refs().set_head(RefTarget::Direct(*target))?;
        Ok(outcome)
    }
}
