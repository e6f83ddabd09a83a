//! One handle over every domain service

use crate::access::AccessGuard;
use crate::attendance::AttendanceService;
use crate::church_invites::ChurchInviteService;
use crate::giving::GivingService;
use crate::payroll::PayrollService;
use crate::prayer::PrayerService;
use crate::school::SchoolService;
use crate::subscription::{PricingService, SubscriptionService};
use crate::surveys::SurveyService;
use crate::tenancy::{BranchService, ChurchService, RegistrationService, UserService};
use crate::units::{UnitInviteService, UnitService};
use ecclesia_auth::{PasswordService, TokenIssuer};
use ecclesia_core::config::Environment;
use ecclesia_core::AppConfig;
use ecclesia_store::DocumentStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct Services {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub guard: AccessGuard,
    pub passwords: PasswordService,
    pub tokens: TokenIssuer,
    pub churches: ChurchService,
    pub users: UserService,
    pub branches: BranchService,
    pub registration: RegistrationService,
    pub subscriptions: SubscriptionService,
    pub pricing: PricingService,
    pub units: UnitService,
    pub unit_invites: UnitInviteService,
    pub church_invites: ChurchInviteService,
    pub surveys: SurveyService,
    pub giving: GivingService,
    pub school: SchoolService,
    pub payroll: PayrollService,
    pub prayer: PrayerService,
    pub attendance: AttendanceService,
}

impl Services {
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        // Full-strength argon2 is too slow for test suites
        let passwords = match config.environment {
            Environment::Production => PasswordService::default(),
            _ => PasswordService::development(),
        };
        let tokens = TokenIssuer::new(&config.auth.jwt_secret, config.auth.jwt_expiry_secs);
        let registration = RegistrationService::new(Arc::clone(&store), passwords.clone(), tokens.clone());

        Self {
            guard: AccessGuard::new(Arc::clone(&store), tokens.clone()),
            churches: ChurchService::new(Arc::clone(&store)),
            users: UserService::new(Arc::clone(&store)),
            branches: BranchService::new(Arc::clone(&store)),
            subscriptions: SubscriptionService::new(Arc::clone(&store)),
            pricing: PricingService::new(Arc::clone(&store)),
            units: UnitService::new(Arc::clone(&store)),
            unit_invites: UnitInviteService::new(Arc::clone(&store)),
            church_invites: ChurchInviteService::new(Arc::clone(&store), registration.clone(), config.clone()),
            surveys: SurveyService::new(Arc::clone(&store)),
            giving: GivingService::new(Arc::clone(&store), config.flutterwave_secret_hash.clone()),
            school: SchoolService::new(Arc::clone(&store)),
            payroll: PayrollService::new(Arc::clone(&store)),
            prayer: PrayerService::new(Arc::clone(&store)),
            attendance: AttendanceService::new(Arc::clone(&store)),
            registration,
            passwords,
            tokens,
            config: config.clone(),
            store,
        }
    }
}
