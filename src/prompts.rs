use crate::error::AppError;
use crate::session::Language;

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PromptId {
    Welcome,
    MainMenu,
    CitySelection,
    JobTypeSelection,
    NoJobs,
    /// Template with `{count}`
    JobsIntro,
    /// Template with `{index}`, `{title}`, `{company}`, `{salary}`
    JobLine,
    PostResults,
    LegalHelp,
    LegalMinimumWage,
    LegalWorkingHours,
    LegalSafetyRights,
    LoanInfo,
    LoanEligibility,
    LoanTypes,
    LoanApplication,
    ReturnHint,
    InvalidInput,
    AgentConnecting,
    AgentUnavailable,
    Goodbye,
    SystemError,
}

impl PromptId {
    pub const ALL: [PromptId; 22] = [
        PromptId::Welcome,
        PromptId::MainMenu,
        PromptId::CitySelection,
        PromptId::JobTypeSelection,
        PromptId::NoJobs,
        PromptId::JobsIntro,
        PromptId::JobLine,
        PromptId::PostResults,
        PromptId::LegalHelp,
        PromptId::LegalMinimumWage,
        PromptId::LegalWorkingHours,
        PromptId::LegalSafetyRights,
        PromptId::LoanInfo,
        PromptId::LoanEligibility,
        PromptId::LoanTypes,
        PromptId::LoanApplication,
        PromptId::ReturnHint,
        PromptId::InvalidInput,
        PromptId::AgentConnecting,
        PromptId::AgentUnavailable,
        PromptId::Goodbye,
        PromptId::SystemError,
    ];
}

/// How a language is voiced by the telephony provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageProfile {
    pub language: Language,
    pub voice: String,
    pub locale: String,
}

/// Immutable `(PromptId, Language)` lookup.  Built once at startup, shared read-only afterwards.
#[derive(Clone, Debug)]
pub struct PromptCatalog {
    profiles: Vec<LanguageProfile>,
    texts: HashMap<(PromptId, Language), String>,
}

impl PromptCatalog {
    /// Build a catalog, requiring a text for every prompt in every profile's language.
    pub fn new(
        profiles: Vec<LanguageProfile>,
        entries: impl IntoIterator<Item = (PromptId, Language, String)>,
    ) -> Result<Self, AppError> {
        if profiles.is_empty() {
            return Err(AppError::Catalog("no language profiles".to_string()));
        }
        let texts: HashMap<(PromptId, Language), String> = entries
            .into_iter()
            .map(|(id, language, text)| ((id, language), text))
            .collect();
        for profile in &profiles {
            for id in PromptId::ALL {
                if !texts.contains_key(&(id, profile.language.clone())) {
                    return Err(AppError::Catalog(format!(
                        "missing {id:?} text for language '{}'",
                        profile.language
                    )));
                }
            }
        }
        Ok(Self { profiles, texts })
    }

    /// The Hindi/English catalog the service ships with.
    pub fn builtin() -> Result<Self, AppError> {
        let profiles = BUILTIN_PROFILES
            .iter()
            .map(|(code, voice, locale)| LanguageProfile {
                language: Language::new(*code),
                voice: voice.to_string(),
                locale: locale.to_string(),
            })
            .collect();
        let entries = BUILTIN_TEXTS.iter().flat_map(|(id, texts)| {
            texts
                .iter()
                .map(move |(code, text)| (*id, Language::new(*code), text.to_string()))
        });
        Self::new(profiles, entries)
    }

    /// Profiles in menu order; digit N picks the N-th one.
    pub fn profiles(&self) -> &[LanguageProfile] {
        &self.profiles
    }

    /// Profile for `language`, falling back to the first profile for unknown codes.
    pub fn profile(&self, language: &Language) -> &LanguageProfile {
        self.profiles
            .iter()
            .find(|p| &p.language == language)
            .unwrap_or(&self.profiles[0])
    }

    /// Text for `id` in `language`, falling back to the first profile's language.
    pub fn text(&self, id: PromptId, language: &Language) -> &str {
        let language = &self.profile(language).language;
        self.texts
            .get(&(id, language.clone()))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Text with `{name}` placeholders substituted.
    pub fn render(&self, id: PromptId, language: &Language, values: &[(&str, &str)]) -> String {
        values
            .iter()
            .fold(self.text(id, language).to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
    }
}

const BUILTIN_PROFILES: &[(&str, &str, &str)] = &[
    ("hi", "Google.hi-IN-Standard-A", "hi-IN"),
    ("en", "Google.en-IN-Standard-A", "en-IN"),
];

type Texts = &'static [(&'static str, &'static str)];

const BUILTIN_TEXTS: &[(PromptId, Texts)] = &[
    (
        PromptId::Welcome,
        &[
            ("hi", "नमस्ते! श्रमिक मित्र में आपका स्वागत है। हिंदी के लिए 1 दबाएं, अंग्रेजी के लिए 2 दबाएं।"),
            ("en", "Hello! Welcome to Shramik Mitra. Press 1 for Hindi, Press 2 for English."),
        ],
    ),
    (
        PromptId::MainMenu,
        &[
            ("hi", "मुख्य मेनू। नौकरी खोजने के लिए 1 दबाएं। कानूनी मदद के लिए 2 दबाएं। लोन जानकारी के लिए 3 दबाएं। एजेंट से बात करने के लिए 0 दबाएं।"),
            ("en", "Main menu. Press 1 for job search. Press 2 for legal help. Press 3 for loan information. Press 0 to speak to an agent."),
        ],
    ),
    (
        PromptId::CitySelection,
        &[
            ("hi", "कृपया शहर चुनें। मुंबई के लिए 1, दिल्ली के लिए 2, बेंगलुरु के लिए 3, चेन्नई के लिए 4, हैदराबाद के लिए 5, पुणे के लिए 6 दबाएं।"),
            ("en", "Please select a city. Press 1 for Mumbai, 2 for Delhi, 3 for Bangalore, 4 for Chennai, 5 for Hyderabad, 6 for Pune."),
        ],
    ),
    (
        PromptId::JobTypeSelection,
        &[
            ("hi", "नौकरी का प्रकार चुनें। निर्माण के लिए 1, डिलीवरी के लिए 2, सुरक्षा के लिए 3, सफाई के लिए 4, ड्राइवर के लिए 5 दबाएं।"),
            ("en", "Select job type. Press 1 for Construction, 2 for Delivery, 3 for Security, 4 for Cleaning, 5 for Driving."),
        ],
    ),
    (
        PromptId::NoJobs,
        &[
            ("hi", "क्षमा करें, इस शहर में कोई नौकरी उपलब्ध नहीं है।"),
            ("en", "Sorry, no jobs available in this city."),
        ],
    ),
    (
        PromptId::JobsIntro,
        &[
            ("hi", "{count} नौकरियां मिलीं। सुनिए:"),
            ("en", "Found {count} jobs. Here they are:"),
        ],
    ),
    (
        PromptId::JobLine,
        &[
            ("hi", "नौकरी {index}. {title} {company} में। सैलरी {salary}।"),
            ("en", "Job {index}. {title} at {company}. Salary {salary}."),
        ],
    ),
    (
        PromptId::PostResults,
        &[
            ("hi", "इन नौकरियों के लिए आवेदन करने के लिए, कृपया हमारी वेबसाइट पर जाएं या हमें कॉल करें। मुख्य मेनू के लिए स्टार दबाएं।"),
            ("en", "To apply for these jobs, please visit our website or call us. Press star for main menu."),
        ],
    ),
    (
        PromptId::LegalHelp,
        &[
            ("hi", "कानूनी मदद। न्यूनतम मजदूरी जानकारी के लिए 1, काम के घंटे के लिए 2, सुरक्षा अधिकार के लिए 3 दबाएं।"),
            ("en", "Legal help. Press 1 for minimum wage info, 2 for working hours, 3 for safety rights."),
        ],
    ),
    (
        PromptId::LegalMinimumWage,
        &[
            ("hi", "न्यूनतम मजदूरी 2025 में राज्य अनुसार 178 से 600 रुपये प्रतिदिन है। अपने राज्य की जानकारी के लिए हमारी वेबसाइट देखें।"),
            ("en", "Minimum wage in 2025 ranges from 178 to 600 rupees per day depending on state. Visit our website for your state information."),
        ],
    ),
    (
        PromptId::LegalWorkingHours,
        &[
            ("hi", "कानूनी काम के घंटे दिन में 8 घंटे हैं। ओवरटाइम के लिए डबल वेतन मिलना चाहिए।"),
            ("en", "Legal working hours are 8 hours per day. Overtime should be paid at double rate."),
        ],
    ),
    (
        PromptId::LegalSafetyRights,
        &[
            ("hi", "आपको सुरक्षा उपकरण, चिकित्सा सुविधा और दुर्घटना बीमा का अधिकार है। अधिक जानकारी के लिए हमसे संपर्क करें।"),
            ("en", "You have right to safety equipment, medical facilities and accident insurance. Contact us for more information."),
        ],
    ),
    (
        PromptId::LoanInfo,
        &[
            ("hi", "लोन जानकारी। पात्रता जांचने के लिए 1, लोन प्रकार के लिए 2, आवेदन प्रक्रिया के लिए 3 दबाएं।"),
            ("en", "Loan information. Press 1 to check eligibility, 2 for loan types, 3 for application process."),
        ],
    ),
    (
        PromptId::LoanEligibility,
        &[
            ("hi", "लोन पात्रता: आपकी उम्र 18 से 60 के बीच होनी चाहिए, आधार कार्ड और बैंक खाता जरूरी है। 5000 से 1 लाख तक का लोन मिल सकता है।"),
            ("en", "Loan eligibility: Age must be between 18 to 60, Aadhaar card and bank account required. Loan amount from 5000 to 1 lakh rupees."),
        ],
    ),
    (
        PromptId::LoanTypes,
        &[
            ("hi", "लोन के प्रकार: तत्काल लोन, आपातकालीन लोन, और व्यवसाय लोन उपलब्ध हैं। ब्याज दर 10 से 18 प्रतिशत तक।"),
            ("en", "Loan types: Instant loan, Emergency loan, and Business loan available. Interest rate from 10 to 18 percent."),
        ],
    ),
    (
        PromptId::LoanApplication,
        &[
            ("hi", "आवेदन प्रक्रिया: हमारी वेबसाइट पर जाएं, फॉर्म भरें, दस्तावेज अपलोड करें। 24 से 48 घंटे में अप्रूवल मिलेगा।"),
            ("en", "Application process: Visit our website, fill form, upload documents. Approval within 24 to 48 hours."),
        ],
    ),
    (
        PromptId::ReturnHint,
        &[
            ("hi", "मुख्य मेनू के लिए स्टार दबाएं।"),
            ("en", "Press star for main menu."),
        ],
    ),
    (
        PromptId::InvalidInput,
        &[
            ("hi", "गलत इनपुट। कृपया फिर से प्रयास करें।"),
            ("en", "Invalid input. Please try again."),
        ],
    ),
    (
        PromptId::AgentConnecting,
        &[
            ("hi", "आपको अब एजेंट से जोड़ा जा रहा है। कृपया प्रतीक्षा करें।"),
            ("en", "Connecting you to an agent. Please wait."),
        ],
    ),
    (
        PromptId::AgentUnavailable,
        &[
            ("hi", "क्षमा करें, एजेंट अभी उपलब्ध नहीं हैं।"),
            ("en", "Sorry, no agents available right now."),
        ],
    ),
    (
        PromptId::Goodbye,
        &[
            ("hi", "धन्यवाद! श्रमिक मित्र को कॉल करने के लिए शुक्रिया। अलविदा!"),
            ("en", "Thank you for calling Shramik Mitra. Goodbye!"),
        ],
    ),
    (
        PromptId::SystemError,
        &[
            ("hi", "क्षमा करें, एक तकनीकी समस्या हुई है। कृपया बाद में फिर से कॉल करें।"),
            ("en", "Sorry, we are having technical trouble. Please call again later."),
        ],
    ),
];
